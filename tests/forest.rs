use std::sync::Arc;

use bevy::prelude::*;
use terrain_streamer::plugins::forest::scatter;
use terrain_streamer::prelude::*;

fn mesh() -> MeshSettings {
    MeshSettings { mesh_scale: 2.0, chunk_size_index: 0, ..default() }
}

fn forest_settings() -> ForestSettings {
    ForestSettings {
        elements: vec![ForestElementSettings {
            min_height: 0.5,
            max_height: 50.0,
            separation: 2,
            perlin_ratio: 1.1,
            density_ratio: 0.5,
            ..default()
        }],
    }
}

fn height_map(centre: Vec2) -> Arc<HeightMap> {
    let settings = HeightMapSettings {
        height_curve: HeightCurve::linear(),
        height_multiplier: 20.0,
        ..default()
    };
    let n = mesh().verts_per_line();
    Arc::new(HeightMapBuilder::new(settings, n).build(n, centre))
}

#[test]
fn scatter_is_deterministic() {
    let hm = height_map(Vec2::ZERO);
    let mut a = Forest::default();
    let mut b = Forest::default();
    let keys_a = scatter(&mut a, &forest_settings(), &mesh(), IVec2::ZERO, Vec2::ZERO, &hm);
    let keys_b = scatter(&mut b, &forest_settings(), &mesh(), IVec2::ZERO, Vec2::ZERO, &hm);
    assert!(!keys_a.is_empty());
    assert_eq!(keys_a, keys_b);
    for k in &keys_a {
        assert_eq!(a.get(*k), b.get(*k));
    }
}

#[test]
fn placed_elements_respect_band_and_separation() {
    let settings = forest_settings();
    let element = &settings.elements[0];
    let hm = height_map(Vec2::ZERO);
    let mut forest = Forest::default();
    let keys = scatter(&mut forest, &settings, &mesh(), IVec2::ZERO, Vec2::ZERO, &hm);
    for (i, a) in keys.iter().enumerate() {
        let placed = forest.get(*a).unwrap();
        let h = placed.position.y + element.y_offset;
        assert!(h > element.min_height && h < element.max_height);
        assert!((-std::f32::consts::PI..std::f32::consts::PI).contains(&placed.yaw));
        assert!((0.5..1.5).contains(&placed.scale));
        assert_eq!(placed.position.x, a.x as f32 * 2.0);
        assert_eq!(placed.position.z, a.y as f32 * 2.0);
        // Later plants never see an earlier one inside their [-sep, sep) window.
        for b in &keys[i + 1..] {
            let d = *a - *b;
            assert!(!((-2..2).contains(&d.x) && (-2..2).contains(&d.y)), "{a} and {b} too close");
        }
    }
}

#[test]
fn replanting_the_same_chunk_adds_nothing() {
    let hm = height_map(Vec2::ZERO);
    let mut forest = Forest::default();
    let first = scatter(&mut forest, &forest_settings(), &mesh(), IVec2::ZERO, Vec2::ZERO, &hm);
    let count = forest.len();
    let second = scatter(&mut forest, &forest_settings(), &mesh(), IVec2::ZERO, Vec2::ZERO, &hm);
    assert!(!first.is_empty());
    assert!(second.is_empty());
    assert_eq!(forest.len(), count);

    forest.remove_all(&first);
    assert!(forest.is_empty());
}

#[test]
fn neighbouring_chunks_own_disjoint_key_blocks() {
    let n = mesh().verts_per_line();
    let step = (n - 3) as f32;
    let mut forest = Forest::default();
    let left = scatter(&mut forest, &forest_settings(), &mesh(), IVec2::ZERO, Vec2::ZERO, &height_map(Vec2::ZERO));
    let centre = Vec2::new(step, 0.0);
    let right = scatter(&mut forest, &forest_settings(), &mesh(), IVec2::X, centre, &height_map(centre));
    let half = ((n - 3) / 2) as i32;
    let left_block = KeyBlock::around(IVec2::ZERO, half);
    let right_block = KeyBlock::around(IVec2::new(step as i32, 0), half);
    assert_eq!(left_block.max.x, right_block.min.x, "blocks tile along x");
    assert!(left.iter().all(|k| left_block.contains(*k)));
    assert!(right.iter().all(|k| right_block.contains(*k)));
    assert!(left.iter().all(|k| !right.contains(k)));
}

#[test]
fn scatter_does_not_depend_on_arrival_order() {
    let step = (mesh().verts_per_line() - 3) as f32;
    let chunks = [
        (IVec2::ZERO, Vec2::ZERO),
        (IVec2::X, Vec2::new(step, 0.0)),
        (IVec2::Y, Vec2::new(0.0, step)),
    ];
    let plant = |order: &[usize]| {
        let mut forest = Forest::default();
        let mut keys = Vec::new();
        for &i in order {
            let (coord, centre) = chunks[i];
            keys.extend(scatter(&mut forest, &forest_settings(), &mesh(), coord, centre, &height_map(centre)));
        }
        keys.sort_by_key(|k| (k.x, k.y));
        let placed: Vec<_> = keys.iter().map(|k| forest.get(*k).cloned()).collect();
        (keys, placed)
    };
    let forward = plant(&[0, 1, 2]);
    let backward = plant(&[2, 1, 0]);
    assert!(!forward.0.is_empty());
    assert_eq!(forward, backward);
}

#[test]
fn key_block_is_half_open() {
    let block = KeyBlock::around(IVec2::ZERO, 3);
    assert!(block.contains(IVec2::new(-3, -3)));
    assert!(block.contains(IVec2::new(2, 2)));
    assert!(!block.contains(IVec2::new(3, 0)));
    assert!(!block.contains(IVec2::new(0, 3)));
}

#[test]
fn zero_density_plants_nothing() {
    let mut settings = forest_settings();
    settings.elements[0].density_ratio = 0.0;
    let mut forest = Forest::default();
    let keys = scatter(&mut forest, &settings, &mesh(), IVec2::ZERO, Vec2::ZERO, &height_map(Vec2::ZERO));
    assert!(keys.is_empty());
    assert!(forest.is_empty());
}
