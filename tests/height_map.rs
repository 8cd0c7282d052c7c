use bevy::prelude::*;
use terrain_streamer::plugins::height_map::{HeightCurveLut, HEIGHT_CURVE_LUT_SIZE};
use terrain_streamer::prelude::*;

fn settings(use_falloff: bool, curve: HeightCurve, multiplier: f32) -> HeightMapSettings {
    HeightMapSettings {
        noise: NoiseSettings { normalize_mode: NormalizeMode::Local, ..default() },
        use_falloff,
        height_multiplier: multiplier,
        height_curve: curve,
    }
}

#[test]
fn falloff_is_zero_in_the_middle_and_one_at_the_rim() {
    let n = 53;
    let map = generate_falloff_map(n);
    let mid = n / 2;
    assert!(map.get(mid, mid) < 1e-3);
    assert!((map.get(0, 0) - 1.0).abs() < 1e-6);
    assert!((map.get(n - 1, mid) - 1.0).abs() < 1e-6);
    for x in mid..n - 1 {
        assert!(map.get(x, mid) <= map.get(x + 1, mid), "falloff must rise towards the edge");
    }
    // Symmetric in both axes.
    assert!((map.get(3, 10) - map.get(n - 4, 10)).abs() < 1e-5);
    assert!((map.get(10, 3) - map.get(10, n - 4)).abs() < 1e-5);
}

#[test]
fn curve_lut_matches_curve() {
    let curve = HeightCurve::default();
    let lut = HeightCurveLut::bake(&curve, HEIGHT_CURVE_LUT_SIZE);
    for i in 0..=100 {
        let t = i as f32 / 100.0;
        assert!((lut.evaluate(t) - curve.evaluate(t)).abs() < 1e-2, "t={t}");
    }
    assert_eq!(lut.evaluate(-1.0), curve.evaluate(0.0));
    assert_eq!(lut.evaluate(2.0), curve.evaluate(1.0));

    let linear = HeightCurveLut::bake(&HeightCurve::linear(), HEIGHT_CURVE_LUT_SIZE);
    assert!((linear.evaluate(0.37) - 0.37).abs() < 1e-5);
}

#[test]
fn min_max_track_realized_values() {
    let builder = HeightMapBuilder::new(settings(false, HeightCurve::default(), 40.0), 53);
    let map = builder.build(53, Vec2::new(12.0, 80.0));
    let values = map.values.values();
    let min = values.iter().cloned().fold(f32::MAX, f32::min);
    let max = values.iter().cloned().fold(f32::MIN, f32::max);
    assert_eq!(map.min_value, min);
    assert_eq!(map.max_value, max);
    assert!(map.min_value >= 0.0 && map.max_value <= 40.0);
}

#[test]
fn linear_curve_and_unit_multiplier_keep_noise_squared() {
    // v * curve(v) * 1 with a linear curve is v^2.
    let s = settings(false, HeightCurve::linear(), 1.0);
    let noise = generate_noise_map(33, 33, &s.noise, Vec2::ZERO);
    let map = HeightMapBuilder::new(s, 33).build(33, Vec2::ZERO);
    for (h, v) in map.values.values().iter().zip(noise.values()) {
        assert!((h - v * v).abs() < 1e-4);
    }
}

#[test]
fn falloff_flattens_the_rim() {
    let builder = HeightMapBuilder::new(settings(true, HeightCurve::linear(), 10.0), 53);
    let map = builder.build(53, Vec2::ZERO);
    assert_eq!(map.get(0, 0), 0.0);
    assert_eq!(map.get(52, 52), 0.0);
    assert_eq!(map.get(0, 26), 0.0);
}

#[test]
fn falloff_adapts_to_other_sizes() {
    let builder = HeightMapBuilder::new(settings(true, HeightCurve::linear(), 1.0), 53);
    let map = builder.build(29, Vec2::ZERO);
    assert_eq!(map.size(), 29);
    assert_eq!(map.get(28, 0), 0.0);
}

#[test]
fn min_and_max_height_come_from_curve_ends() {
    let s = HeightMapSettings { height_multiplier: 60.0, ..default() };
    assert_eq!(s.min_height(), 0.0);
    assert_eq!(s.max_height(), 60.0);
}
