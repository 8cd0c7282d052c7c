//! Grayscale PNG export of a chunk heightmap or the falloff mask.
use std::fs;
use std::path::Path;
use std::str::FromStr;

use bevy::prelude::*;
use image::{GrayImage, Luma};

use crate::plugins::height_map::{generate_falloff_map, HeightMapBuilder};
use crate::plugins::noise_field::NoiseMap;
use crate::plugins::terrain_settings::TerrainSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewMode {
    NoiseMap,
    Falloff,
}

impl FromStr for PreviewMode {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noise" => Ok(Self::NoiseMap),
            "falloff" => Ok(Self::Falloff),
            other => Err(PreviewError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PreviewError {
    #[error("unknown preview mode {0:?} (expected noise|falloff)")]
    UnknownMode(String),
    #[error("failed to create {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
}

fn to_image(values: &NoiseMap, min: f32, max: f32) -> GrayImage {
    let range = max - min;
    GrayImage::from_fn(values.width() as u32, values.height() as u32, |x, y| {
        let v = values.get(x as usize, y as usize);
        let t = if range > 0.0 { ((v - min) / range).clamp(0.0, 1.0) } else { 0.0 };
        Luma([(t * 255.0).round() as u8])
    })
}

/// Render one chunk-sized map centred on the origin.
pub fn render_preview(mode: PreviewMode, settings: &TerrainSettings) -> GrayImage {
    let n = settings.mesh.verts_per_line();
    match mode {
        PreviewMode::NoiseMap => {
            let builder = HeightMapBuilder::new(settings.height_map.clone(), n);
            let map = builder.build(n, Vec2::ZERO);
            to_image(&map.values, map.min_value, map.max_value)
        }
        PreviewMode::Falloff => to_image(&generate_falloff_map(n), 0.0, 1.0),
    }
}

pub fn write_preview(
    mode: PreviewMode,
    settings: &TerrainSettings,
    path: impl AsRef<Path>,
) -> Result<(), PreviewError> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| PreviewError::Io {
            path: dir.display().to_string(),
            source,
        })?;
    }
    let image = render_preview(mode, settings);
    image.save(path)?;
    info!("PREVIEW saved mode={mode:?} path={} size={}x{}", path.display(), image.width(), image.height());
    Ok(())
}
