// Terrain configuration (RON): noise, heightmap shaping, mesh sizing, LOD table, forest.
use std::fs;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub const NUM_SUPPORTED_LODS: u32 = 5;
pub const SUPPORTED_CHUNK_SIZES: [usize; 9] = [48, 72, 96, 120, 144, 168, 192, 216, 240];
pub const NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES: usize = 3;

pub const MIN_NOISE_SCALE: f32 = 0.01;
const MIN_HEIGHT_BAND: f32 = 0.01;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse terrain settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("detail level table is empty")]
    NoDetailLevels,

    #[error("detail level {index} has lod {lod}, supported range is 0..{max}")]
    LodOutOfRange { index: usize, lod: u32, max: u32 },

    #[error("detail level thresholds must be positive and ascending (index {index})")]
    ThresholdOrder { index: usize },

    #[error("collider lod index {index} out of range for {len} detail levels")]
    ColliderLodOutOfRange { index: usize, len: usize },

    #[error("chunk size index {index} out of range (max {max})")]
    ChunkSizeOutOfRange { index: usize, max: usize },

    #[error("mesh scale must be positive, got {0}")]
    MeshScale(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Remap each sampled region to its own observed min/max.
    #[default]
    Local,
    /// Divide by the theoretical amplitude sum so separately sampled regions agree.
    Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub normalize_mode: NormalizeMode,
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub seed: u32,
    pub offset: (f32, f32),
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            normalize_mode: NormalizeMode::Global,
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            seed: 1337,
            offset: (0.0, 0.0),
        }
    }
}

impl NoiseSettings {
    pub fn validate(&mut self) {
        self.scale = self.scale.max(MIN_NOISE_SCALE);
        self.octaves = self.octaves.max(1);
        self.lacunarity = self.lacunarity.max(1.0);
        self.persistence = self.persistence.clamp(0.0, 1.0);
    }
}

/// One keyframe of the height remapping curve; `t` and `value` are both normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub t: f32,
    pub value: f32,
}

/// Piecewise-linear height curve. Baked into a lookup table before use (see `HeightCurveLut`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightCurve {
    pub keys: Vec<CurveKey>,
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self {
            keys: vec![
                CurveKey { t: 0.0, value: 0.0 },
                CurveKey { t: 0.3, value: 0.05 },
                CurveKey { t: 1.0, value: 1.0 },
            ],
        }
    }
}

impl HeightCurve {
    pub fn linear() -> Self {
        Self {
            keys: vec![CurveKey { t: 0.0, value: 0.0 }, CurveKey { t: 1.0, value: 1.0 }],
        }
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let Some(first) = self.keys.first() else { return t; };
        if t <= first.t {
            return first.value;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.t {
                let span = b.t - a.t;
                if span <= f32::EPSILON {
                    return b.value;
                }
                let f = (t - a.t) / span;
                return a.value + (b.value - a.value) * f;
            }
        }
        self.keys.last().map(|k| k.value).unwrap_or(t)
    }

    fn sort(&mut self) {
        self.keys.sort_by(|a, b| a.t.total_cmp(&b.t));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightMapSettings {
    pub noise: NoiseSettings,
    pub use_falloff: bool,
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            use_falloff: false,
            height_multiplier: 60.0,
            height_curve: HeightCurve::default(),
        }
    }
}

impl HeightMapSettings {
    pub fn min_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(0.0)
    }

    pub fn max_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub mesh_scale: f32,
    pub use_flat_shading: bool,
    pub chunk_size_index: usize,
    pub flat_shaded_chunk_size_index: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mesh_scale: 2.5,
            use_flat_shading: false,
            chunk_size_index: 4,
            flat_shaded_chunk_size_index: 0,
        }
    }
}

impl MeshSettings {
    /// Samples per line at LOD 0, including the out-of-mesh ring and the mesh-edge ring.
    pub fn verts_per_line(&self) -> usize {
        let index = if self.use_flat_shading {
            self.flat_shaded_chunk_size_index
        } else {
            self.chunk_size_index
        };
        SUPPORTED_CHUNK_SIZES[index.min(SUPPORTED_CHUNK_SIZES.len() - 1)] + 5
    }

    pub fn mesh_world_size(&self) -> f32 {
        (self.verts_per_line() - 3) as f32 * self.mesh_scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    pub lod: u32,
    pub visible_dst_threshold: f32,
}

impl LodInfo {
    pub fn sqr_visible_dst_threshold(&self) -> f32 {
        self.visible_dst_threshold * self.visible_dst_threshold
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    pub detail_levels: Vec<LodInfo>,
    pub collider_lod_index: usize,
    pub collider_generation_distance: f32,
    pub move_threshold_for_chunk_update: f32,
    /// Ticks a chunk may stay invisible outside the window before it is dropped. `None` keeps chunks forever.
    pub evict_after_ticks: Option<u64>,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            detail_levels: vec![
                LodInfo { lod: 0, visible_dst_threshold: 200.0 },
                LodInfo { lod: 1, visible_dst_threshold: 400.0 },
                LodInfo { lod: 4, visible_dst_threshold: 800.0 },
            ],
            collider_lod_index: 0,
            collider_generation_distance: 5.0,
            move_threshold_for_chunk_update: 25.0,
            evict_after_ticks: Some(600),
        }
    }
}

impl StreamingSettings {
    pub fn max_view_distance(&self) -> f32 {
        self.detail_levels
            .last()
            .map(|l| l.visible_dst_threshold)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestElementSettings {
    pub name: String,
    pub model: String,
    pub min_height: f32,
    pub max_height: f32,
    pub separation: i32,
    pub y_offset: f32,
    pub perlin_ratio: f32,
    pub density_ratio: f32,
    pub noise: NoiseSettings,
}

impl Default for ForestElementSettings {
    fn default() -> Self {
        Self {
            name: "tree".into(),
            model: "models/tree_1.glb#Scene0".into(),
            min_height: 4.0,
            max_height: 30.0,
            separation: 3,
            y_offset: 0.2,
            perlin_ratio: 0.5,
            density_ratio: 0.1,
            noise: NoiseSettings {
                normalize_mode: NormalizeMode::Global,
                scale: 20.0,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
                seed: 917_331,
                offset: (0.0, 0.0),
            },
        }
    }
}

impl ForestElementSettings {
    pub fn validate(&mut self) {
        if self.min_height >= self.max_height {
            self.max_height = self.min_height + MIN_HEIGHT_BAND;
        }
        self.separation = self.separation.max(0);
        self.perlin_ratio = self.perlin_ratio.clamp(0.0, 1.0);
        self.density_ratio = self.density_ratio.clamp(0.0, 1.0);
        self.noise.validate();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestSettings {
    pub elements: Vec<ForestElementSettings>,
}

impl Default for ForestSettings {
    fn default() -> Self {
        Self { elements: vec![ForestElementSettings::default()] }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct TerrainSettings {
    pub height_map: HeightMapSettings,
    pub mesh: MeshSettings,
    pub streaming: StreamingSettings,
    pub forest: ForestSettings,
}

impl TerrainSettings {
    pub fn from_ron_str(data: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str::<TerrainSettings>(data)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&data)
    }

    /// Clamp recoverable values into range.
    pub fn validate(&mut self) {
        self.height_map.noise.validate();
        self.height_map.height_curve.sort();
        for element in &mut self.forest.elements {
            element.validate();
        }
    }

    /// Configuration invariants that are programmer errors rather than clampable values.
    pub fn check(&self) -> Result<(), SettingsError> {
        let levels = &self.streaming.detail_levels;
        if levels.is_empty() {
            return Err(SettingsError::NoDetailLevels);
        }
        let mut previous = 0.0_f32;
        for (index, level) in levels.iter().enumerate() {
            if level.lod >= NUM_SUPPORTED_LODS {
                return Err(SettingsError::LodOutOfRange {
                    index,
                    lod: level.lod,
                    max: NUM_SUPPORTED_LODS - 1,
                });
            }
            if level.visible_dst_threshold <= previous {
                return Err(SettingsError::ThresholdOrder { index });
            }
            previous = level.visible_dst_threshold;
        }
        if self.streaming.collider_lod_index >= levels.len() {
            return Err(SettingsError::ColliderLodOutOfRange {
                index: self.streaming.collider_lod_index,
                len: levels.len(),
            });
        }
        let (index, max) = if self.mesh.use_flat_shading {
            (self.mesh.flat_shaded_chunk_size_index, NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES - 1)
        } else {
            (self.mesh.chunk_size_index, SUPPORTED_CHUNK_SIZES.len() - 1)
        };
        if index > max {
            return Err(SettingsError::ChunkSizeOutOfRange { index, max });
        }
        if self.mesh.mesh_scale <= 0.0 {
            return Err(SettingsError::MeshScale(self.mesh.mesh_scale));
        }
        Ok(())
    }
}
