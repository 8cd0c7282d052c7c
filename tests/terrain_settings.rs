use terrain_streamer::plugins::terrain_settings::SUPPORTED_CHUNK_SIZES;
use terrain_streamer::prelude::*;

#[test]
fn shipped_config_loads_and_checks() {
    let settings = TerrainSettings::load("assets/terrain.ron").unwrap();
    settings.check().unwrap();
    assert_eq!(settings.streaming.detail_levels.len(), 3);
    assert_eq!(settings.streaming.max_view_distance(), 800.0);
    assert_eq!(settings.forest.elements[0].name, "pine");
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let settings = TerrainSettings::from_ron_str("(mesh: (mesh_scale: 1.0))").unwrap();
    assert_eq!(settings.mesh.mesh_scale, 1.0);
    assert_eq!(settings.mesh.chunk_size_index, MeshSettings::default().chunk_size_index);
    assert_eq!(settings.streaming, StreamingSettings::default());
    assert_eq!(settings.height_map, HeightMapSettings::default());
}

#[test]
fn parse_and_io_errors_are_reported() {
    assert!(matches!(TerrainSettings::from_ron_str("(mesh: ["), Err(SettingsError::Parse(_))));
    assert!(matches!(TerrainSettings::load("assets/does_not_exist.ron"), Err(SettingsError::Io { .. })));
}

#[test]
fn mesh_sizes_follow_chunk_table() {
    let mesh = MeshSettings { mesh_scale: 2.0, use_flat_shading: false, chunk_size_index: 8, flat_shaded_chunk_size_index: 0 };
    assert_eq!(mesh.verts_per_line(), SUPPORTED_CHUNK_SIZES[8] + 5);
    assert_eq!(mesh.mesh_world_size(), (SUPPORTED_CHUNK_SIZES[8] + 2) as f32 * 2.0);

    let flat = MeshSettings { use_flat_shading: true, flat_shaded_chunk_size_index: 1, ..mesh };
    assert_eq!(flat.verts_per_line(), 72 + 5);
}

#[test]
fn validate_clamps_recoverable_values() {
    let mut settings = TerrainSettings::default();
    settings.height_map.noise.scale = 0.0;
    settings.height_map.noise.lacunarity = 0.2;
    settings.height_map.noise.persistence = 3.0;
    settings.forest.elements[0].min_height = 10.0;
    settings.forest.elements[0].max_height = 2.0;
    settings.validate();
    assert_eq!(settings.height_map.noise.scale, 0.01);
    assert_eq!(settings.height_map.noise.lacunarity, 1.0);
    assert_eq!(settings.height_map.noise.persistence, 1.0);
    let element = &settings.forest.elements[0];
    assert!(element.max_height > element.min_height);
    assert!(element.max_height - element.min_height < 0.1);
}

#[test]
fn check_rejects_programmer_errors() {
    let mut s = TerrainSettings::default();
    s.streaming.detail_levels[1].visible_dst_threshold = 100.0;
    assert!(matches!(s.check(), Err(SettingsError::ThresholdOrder { index: 1 })));

    let mut s = TerrainSettings::default();
    s.streaming.detail_levels[0].lod = 5;
    assert!(matches!(s.check(), Err(SettingsError::LodOutOfRange { index: 0, .. })));

    let mut s = TerrainSettings::default();
    s.mesh.use_flat_shading = true;
    s.mesh.flat_shaded_chunk_size_index = 3;
    assert!(matches!(s.check(), Err(SettingsError::ChunkSizeOutOfRange { index: 3, max: 2 })));

    let mut s = TerrainSettings::default();
    s.mesh.mesh_scale = 0.0;
    assert!(matches!(s.check(), Err(SettingsError::MeshScale(_))));

    assert!(TerrainSettings::default().check().is_ok());
}
