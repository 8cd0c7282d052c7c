use bevy::prelude::*;

use crate::plugins::noise_field::{generate_noise_map, NoiseMap};
use crate::plugins::terrain_settings::{HeightCurve, HeightMapSettings};

pub const HEIGHT_CURVE_LUT_SIZE: usize = 256;

const FALLOFF_A: f32 = 3.0;
const FALLOFF_B: f32 = 2.2;

/// Finished heightmap for one chunk. Includes the out-of-mesh border ring.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap {
    pub values: NoiseMap,
    pub min_value: f32,
    pub max_value: f32,
}

impl HeightMap {
    pub fn size(&self) -> usize {
        self.values.width()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values.get(x, y)
    }
}

/// Height curve sampled at a fixed resolution; evaluation is a lerp between neighbouring samples.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightCurveLut {
    samples: Vec<f32>,
}

impl HeightCurveLut {
    pub fn bake(curve: &HeightCurve, resolution: usize) -> Self {
        let resolution = resolution.max(2);
        let last = (resolution - 1) as f32;
        let samples = (0..resolution)
            .map(|i| curve.evaluate(i as f32 / last))
            .collect();
        Self { samples }
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let last = self.samples.len() - 1;
        let pos = t.clamp(0.0, 1.0) * last as f32;
        let i = (pos.floor() as usize).min(last);
        let j = (i + 1).min(last);
        let f = pos - i as f32;
        self.samples[i] + (self.samples[j] - self.samples[i]) * f
    }
}

/// Radial-ish mask that rises from 0 in the middle towards 1 at the edges.
pub fn generate_falloff_map(size: usize) -> NoiseMap {
    let mut map = NoiseMap::new(size, size);
    let denom = (size.max(2) - 1) as f32;
    for j in 0..size {
        for i in 0..size {
            let x = i as f32 / denom * 2.0 - 1.0;
            let y = j as f32 / denom * 2.0 - 1.0;
            let t = x.abs().max(y.abs());
            map.set(i, j, falloff_curve(t));
        }
    }
    map
}

fn falloff_curve(t: f32) -> f32 {
    let a = t.powf(FALLOFF_A);
    let b = (FALLOFF_B - FALLOFF_B * t).powf(FALLOFF_A);
    if a + b <= 0.0 {
        return 0.0;
    }
    a / (a + b)
}

/// Produces chunk heightmaps. Cheap to share between worker tasks behind an `Arc`.
#[derive(Debug, Clone)]
pub struct HeightMapBuilder {
    settings: HeightMapSettings,
    curve: HeightCurveLut,
    falloff: Option<NoiseMap>,
}

impl HeightMapBuilder {
    pub fn new(settings: HeightMapSettings, verts_per_line: usize) -> Self {
        let curve = HeightCurveLut::bake(&settings.height_curve, HEIGHT_CURVE_LUT_SIZE);
        let falloff = settings.use_falloff.then(|| generate_falloff_map(verts_per_line));
        Self { settings, curve, falloff }
    }

    pub fn settings(&self) -> &HeightMapSettings {
        &self.settings
    }

    pub fn curve(&self) -> &HeightCurveLut {
        &self.curve
    }

    pub fn build(&self, verts_per_line: usize, sample_centre: Vec2) -> HeightMap {
        let mut values = generate_noise_map(
            verts_per_line,
            verts_per_line,
            &self.settings.noise,
            sample_centre,
        );

        if self.settings.use_falloff {
            // Precomputed mask only matches one size; other sizes (previews) get a fresh one.
            let fresh;
            let mask = match &self.falloff {
                Some(m) if m.width() == verts_per_line => m,
                _ => {
                    fresh = generate_falloff_map(verts_per_line);
                    &fresh
                }
            };
            for (v, f) in values.values_mut().iter_mut().zip(mask.values()) {
                *v = (*v - f).clamp(0.0, 1.0);
            }
        }

        let mut min_value = f32::MAX;
        let mut max_value = f32::MIN;
        let multiplier = self.settings.height_multiplier;
        for v in values.values_mut() {
            *v *= self.curve.evaluate(*v) * multiplier;
            min_value = min_value.min(*v);
            max_value = max_value.max(*v);
        }

        HeightMap { values, min_value, max_value }
    }
}
