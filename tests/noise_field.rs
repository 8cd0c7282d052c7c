use bevy::prelude::*;
use terrain_streamer::prelude::*;

fn noise(mode: NormalizeMode, seed: u32) -> NoiseSettings {
    NoiseSettings {
        normalize_mode: mode,
        scale: 35.0,
        octaves: 5,
        persistence: 0.5,
        lacunarity: 2.0,
        seed,
        offset: (0.0, 0.0),
    }
}

#[test]
fn local_values_stay_in_unit_range() {
    for seed in [0, 1, 42, 9001] {
        for (w, h) in [(1, 1), (17, 9), (53, 53)] {
            let map = generate_noise_map(w, h, &noise(NormalizeMode::Local, seed), Vec2::new(13.0, -7.0));
            assert_eq!(map.values().len(), w * h);
            assert!(map.values().iter().all(|v| (0.0..=1.0).contains(v)), "seed={seed} size={w}x{h}");
        }
    }
}

#[test]
fn identical_inputs_are_bit_identical() {
    let settings = noise(NormalizeMode::Global, 77);
    let a = generate_noise_map(40, 40, &settings, Vec2::new(100.0, 25.0));
    let b = generate_noise_map(40, 40, &settings, Vec2::new(100.0, 25.0));
    let bits = |m: &NoiseMap| m.values().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&a), bits(&b));
}

#[test]
fn different_seeds_differ() {
    let a = generate_noise_map(32, 32, &noise(NormalizeMode::Local, 1), Vec2::ZERO);
    let b = generate_noise_map(32, 32, &noise(NormalizeMode::Local, 2), Vec2::ZERO);
    assert_ne!(a, b);
}

#[test]
fn global_mode_neighbours_share_edge_values() {
    let settings = noise(NormalizeMode::Global, 1337);
    let n = 53;
    let step = (n - 3) as f32;

    // Neighbour to the right: its column 1 is our column n - 2.
    let centre = generate_noise_map(n, n, &settings, Vec2::ZERO);
    let right = generate_noise_map(n, n, &settings, Vec2::new(step, 0.0));
    for y in 0..n {
        assert_eq!(centre.get(n - 2, y), right.get(1, y), "row {y}");
        assert_eq!(centre.get(n - 1, y), right.get(2, y), "row {y}");
    }

    // Neighbour with larger centre.y sits on the row-0 side.
    let up = generate_noise_map(n, n, &settings, Vec2::new(0.0, step));
    for x in 0..n {
        assert_eq!(centre.get(x, 1), up.get(x, n - 2), "column {x}");
    }
}

#[test]
fn global_mode_stays_within_amplitude_bound() {
    let settings = noise(NormalizeMode::Global, 5);
    // Sum of octave amplitudes: 1 + 0.5 + 0.25 + 0.125 + 0.0625.
    let max_possible = 1.9375_f32;
    let bound = (max_possible + 1.0) / (max_possible / 0.9) + 1e-4;
    for centre in [Vec2::ZERO, Vec2::new(5000.0, -3000.0)] {
        let map = generate_noise_map(30, 30, &settings, centre);
        assert!(map.values().iter().all(|v| (0.0..=bound).contains(v)), "centre={centre}");
    }
}

#[test]
fn clamped_settings_still_sample() {
    let mut settings = noise(NormalizeMode::Local, 3);
    settings.scale = -4.0;
    settings.octaves = 0;
    settings.validate();
    assert_eq!(settings.scale, 0.01);
    assert_eq!(settings.octaves, 1);
    let map = generate_noise_map(8, 8, &settings, Vec2::ZERO);
    assert!(map.values().iter().all(|v| v.is_finite()));
}
