//! Library entry for integration tests & external tooling.
//! Exposes plugin modules and a prelude for common types.

pub mod plugins {
    pub mod core_sim;
    pub mod terrain_settings;
    pub mod noise_field;
    pub mod height_map;
    pub mod mesh_builder;
    pub mod compute_queue;
    pub mod forest;
    pub mod terrain_chunk;
    pub mod chunk_grid;
    pub mod terrain;
    pub mod viewer;
}
pub mod preview;
pub mod prelude;
