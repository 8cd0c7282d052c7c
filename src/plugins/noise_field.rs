use bevy::prelude::*;
use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::plugins::terrain_settings::{NoiseSettings, NormalizeMode, MIN_NOISE_SCALE};

const OCTAVE_OFFSET_RANGE: i32 = 100_000;
/// Global normalization assumes real samples rarely exceed this share of the amplitude sum.
const GLOBAL_HEADROOM: f64 = 0.9;

/// Row-major 2D grid of scalar samples.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl NoiseMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, values: vec![0.0; width * height] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.values[y * self.width + x] = v;
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }
}

/// Multi-octave Perlin field sampled on a `width x height` grid whose middle maps to `sample_centre`.
///
/// Deterministic for identical inputs. With `NormalizeMode::Global`, grids sampled at different
/// centres agree on the values of the world positions they share.
pub fn generate_noise_map(
    width: usize,
    height: usize,
    settings: &NoiseSettings,
    sample_centre: Vec2,
) -> NoiseMap {
    let mut map = NoiseMap::new(width, height);
    let octaves = settings.octaves.max(1) as usize;
    let scale = settings.scale.max(MIN_NOISE_SCALE) as f64;
    let persistence = settings.persistence as f64;
    let lacunarity = settings.lacunarity as f64;

    let perlin = Perlin::new(settings.seed);
    let mut prng = ChaCha8Rng::seed_from_u64(settings.seed as u64);
    let mut octave_offsets: Vec<(f64, f64)> = Vec::with_capacity(octaves);

    let mut max_possible_height = 0.0_f64;
    let mut amplitude = 1.0_f64;
    for _ in 0..octaves {
        let ox = prng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64
            + settings.offset.0 as f64
            + sample_centre.x as f64;
        let oy = prng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64
            - settings.offset.1 as f64
            - sample_centre.y as f64;
        octave_offsets.push((ox, oy));
        max_possible_height += amplitude;
        amplitude *= persistence;
    }

    let half_w = (width / 2) as f64;
    let half_h = (height / 2) as f64;
    let mut min_local = f64::MAX;
    let mut max_local = f64::MIN;

    for y in 0..height {
        for x in 0..width {
            let mut amplitude = 1.0_f64;
            let mut frequency = 1.0_f64;
            let mut noise_height = 0.0_f64;

            for &(ox, oy) in &octave_offsets {
                let sx = (x as f64 - half_w + ox) / scale * frequency;
                let sy = (y as f64 - half_h + oy) / scale * frequency;
                noise_height += perlin.get([sx, sy]) * amplitude;
                amplitude *= persistence;
                frequency *= lacunarity;
            }

            min_local = min_local.min(noise_height);
            max_local = max_local.max(noise_height);

            let v = match settings.normalize_mode {
                NormalizeMode::Global => {
                    ((noise_height + 1.0) / (max_possible_height / GLOBAL_HEADROOM)).max(0.0)
                }
                NormalizeMode::Local => noise_height,
            };
            map.set(x, y, v as f32);
        }
    }

    if settings.normalize_mode == NormalizeMode::Local {
        let range = max_local - min_local;
        for v in map.values_mut() {
            *v = if range > 0.0 {
                ((*v as f64 - min_local) / range).clamp(0.0, 1.0) as f32
            } else {
                0.0
            };
        }
    }

    map
}
