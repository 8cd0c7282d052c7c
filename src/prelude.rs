//! Convenience re-exports for frequently used types & plugins.
pub use crate::plugins::core_sim::{SimState, RunConfig, LogState, CoreSimPlugin};
pub use crate::plugins::terrain_settings::{
    TerrainSettings, HeightMapSettings, MeshSettings, StreamingSettings, ForestSettings,
    ForestElementSettings, NoiseSettings, NormalizeMode, LodInfo, HeightCurve, CurveKey, SettingsError,
};
pub use crate::plugins::noise_field::{NoiseMap, generate_noise_map};
pub use crate::plugins::height_map::{HeightMap, HeightMapBuilder, generate_falloff_map};
pub use crate::plugins::mesh_builder::{MeshPayload, VertexClass, build_terrain_mesh};
pub use crate::plugins::compute_queue::{ComputeQueue, JobError, JobResult};
pub use crate::plugins::forest::{Forest, KeyBlock, PlacedElement};
pub use crate::plugins::terrain_chunk::{TerrainChunk, ChunkEvent, ChunkState, ChunkContext, MAX_JOB_ATTEMPTS};
pub use crate::plugins::chunk_grid::ChunkGrid;
pub use crate::plugins::terrain::{TerrainPlugin, TerrainRenderPlugin, ChunkStats, TerrainChunkEntity};
pub use crate::plugins::viewer::{Viewer, ViewerPlugin, Autopilot};
pub use crate::preview::{PreviewMode, PreviewError, write_preview};
