// Vegetation scatter on top of a finished chunk heightmap.
//
// Per interior sample, per element:
//  - height_band   -> reject outside (min_height, max_height)
//  - noise_gate    -> element noise must be below perlin_ratio
//  - density_roll  -> seeded roll below density_ratio
//  - can_plant     -> no existing element within the separation window
//  - build_element -> position, yaw, uniform scale
//
// Keys are integer world-grid coordinates (one unit per heightmap sample). Each chunk plants
// only into its own half-open `KeyBlock`; neighbouring blocks tile without overlap, so the
// result does not depend on which chunk's heightmap lands first.
use std::collections::HashMap;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::plugins::height_map::HeightMap;
use crate::plugins::noise_field::generate_noise_map;
use crate::plugins::terrain_settings::{ForestElementSettings, ForestSettings, MeshSettings};

const SCALE_MIN: f32 = 0.5;
const SCALE_MAX: f32 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedElement {
    pub element_index: usize,
    pub name: String,
    pub model: String,
    /// World-space position.
    pub position: Vec3,
    pub yaw: f32,
    pub scale: f32,
}

/// Every placed element across all chunks, keyed by world-grid coordinate.
#[derive(Debug, Default)]
pub struct Forest {
    trees: HashMap<IVec2, PlacedElement>,
}

impl Forest {
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn get(&self, key: IVec2) -> Option<&PlacedElement> {
        self.trees.get(&key)
    }

    /// True when `key` is in `block`, free, and no tree in `block` sits inside its separation window.
    pub fn can_plant(&self, key: IVec2, separation: i32, block: KeyBlock) -> bool {
        if !block.contains(key) || self.trees.contains_key(&key) {
            return false;
        }
        for dy in -separation..separation {
            for dx in -separation..separation {
                let other = key + IVec2::new(dx, dy);
                if block.contains(other) && self.trees.contains_key(&other) {
                    return false;
                }
            }
        }
        true
    }

    pub fn remove_all(&mut self, keys: &[IVec2]) {
        for key in keys {
            self.trees.remove(key);
        }
    }

    fn insert(&mut self, key: IVec2, element: PlacedElement) {
        self.trees.insert(key, element);
    }
}

/// Half-open range `[min, max)` of world-grid keys owned by one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBlock {
    pub min: IVec2,
    pub max: IVec2,
}

impl KeyBlock {
    pub fn around(centre: IVec2, half: i32) -> Self {
        Self { min: centre - IVec2::splat(half), max: centre + IVec2::splat(half) }
    }

    pub fn contains(&self, key: IVec2) -> bool {
        key.cmpge(self.min).all() && key.cmplt(self.max).all()
    }
}

fn height_band(h: f32, element: &ForestElementSettings) -> bool {
    h > element.min_height && h < element.max_height
}

fn chunk_rng(coord: IVec2, element: &ForestElementSettings, element_index: usize) -> ChaCha8Rng {
    let seed = ((coord.x as u32 as u64) << 32 | coord.y as u32 as u64)
        ^ (element.noise.seed as u64).rotate_left(17)
        ^ element_index as u64;
    ChaCha8Rng::seed_from_u64(seed)
}

fn build_element(
    element_index: usize,
    element: &ForestElementSettings,
    position: Vec3,
    rng: &mut impl Rng,
) -> PlacedElement {
    PlacedElement {
        element_index,
        name: element.name.clone(),
        model: element.model.clone(),
        position,
        yaw: rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI),
        scale: rng.gen_range(SCALE_MIN..SCALE_MAX),
    }
}

/// Plant elements for one chunk. Returns the keys added to `forest`.
pub fn scatter(
    forest: &mut Forest,
    settings: &ForestSettings,
    mesh: &MeshSettings,
    coord: IVec2,
    sample_centre: Vec2,
    height_map: &HeightMap,
) -> Vec<IVec2> {
    let n = height_map.size();
    let half = ((n - 3) / 2) as i32;
    let centre = sample_centre.round().as_ivec2();
    let block = KeyBlock::around(centre, half);
    let scale = mesh.mesh_scale;
    let mut keys = Vec::new();

    let gates: Vec<_> = settings
        .elements
        .iter()
        .map(|e| generate_noise_map(n, n, &e.noise, sample_centre))
        .collect();
    let mut rngs: Vec<_> = settings
        .elements
        .iter()
        .enumerate()
        .map(|(i, e)| chunk_rng(coord, e, i))
        .collect();

    // Out-of-mesh ring is skipped: it belongs to the neighbour.
    for y in 1..n - 1 {
        for x in 1..n - 1 {
            let h = height_map.get(x, y);
            let key = IVec2::new(centre.x + x as i32 - 1 - half, centre.y + half - (y as i32 - 1));
            for (i, element) in settings.elements.iter().enumerate() {
                let rng = &mut rngs[i];
                // Roll unconditionally so the sequence does not depend on earlier rejections.
                let roll: f32 = rng.gen();
                if !height_band(h, element) || gates[i].get(x, y) >= element.perlin_ratio {
                    continue;
                }
                if roll >= element.density_ratio || !forest.can_plant(key, element.separation, block) {
                    continue;
                }
                let position = Vec3::new(
                    key.x as f32 * scale,
                    h - element.y_offset,
                    key.y as f32 * scale,
                );
                let placed = build_element(i, element, position, rng);
                forest.insert(key, placed);
                keys.push(key);
            }
        }
    }
    keys
}
