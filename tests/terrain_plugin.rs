use bevy::prelude::*;
use terrain_streamer::plugins::viewer::autopilot_viewer;
use terrain_streamer::prelude::*;

fn small_settings() -> TerrainSettings {
    let mut s = TerrainSettings::default();
    s.mesh = MeshSettings { mesh_scale: 2.5, chunk_size_index: 0, ..default() };
    s.streaming.detail_levels = vec![
        LodInfo { lod: 0, visible_dst_threshold: 100.0 },
        LodInfo { lod: 2, visible_dst_threshold: 250.0 },
    ];
    s
}

// Headless app: streaming only, no render/window plugins.
fn build_app(settings: TerrainSettings) -> App {
    let mut app = App::new();
    app.insert_resource(settings)
        .add_plugins(MinimalPlugins)
        .add_plugins(TerrainPlugin);
    app
}

#[test]
fn grid_streams_around_origin_without_viewer() {
    let mut app = build_app(small_settings());
    app.update();
    let grid = app.world().get_resource::<ChunkGrid>().unwrap();
    assert_eq!(grid.chunk_count(), 25);
    let stats = app.world().get_resource::<ChunkStats>().unwrap();
    assert_eq!(stats.created, 25);
    assert_eq!(stats.loaded, 25);

    let events = app.world().resource::<Events<ChunkEvent>>();
    let created = events
        .get_reader()
        .read(events)
        .filter(|e| matches!(e, ChunkEvent::Created { .. }))
        .count();
    assert_eq!(created, 25);

    app.world_mut().resource_mut::<ChunkGrid>().wait_for_jobs();
    app.update();
    assert_eq!(app.world().resource::<ChunkStats>().visible, 21);
    app.world_mut().resource_mut::<ChunkGrid>().wait_for_jobs();
}

#[test]
fn viewer_transform_drives_streaming() {
    let mut app = build_app(small_settings());
    app.world_mut().spawn((Transform::from_xyz(1000.0, 50.0, -500.0), Viewer));
    app.update();
    let grid = app.world().resource::<ChunkGrid>();
    assert_eq!(grid.viewer_position(), Vec2::new(1000.0, -500.0));
    assert!(grid.chunk(IVec2::new(8, -4)).is_some());
    assert!(grid.chunk(IVec2::ZERO).is_none());
    app.world_mut().resource_mut::<ChunkGrid>().wait_for_jobs();
}

#[test]
fn invalid_settings_leave_no_grid() {
    let mut settings = small_settings();
    settings.streaming.detail_levels.clear();
    let mut app = build_app(settings);
    app.update();
    app.update();
    assert!(app.world().get_resource::<ChunkGrid>().is_none());
}

#[test]
fn autopilot_moves_viewer_along_heading() {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(Autopilot { enabled: true, heading: Vec2::X, speed: 10.0 })
        .add_systems(Update, autopilot_viewer);
    let viewer = app.world_mut().spawn((Transform::default(), Viewer)).id();
    app.update();
    app.update();
    let t = app.world().get::<Transform>(viewer).unwrap();
    assert!(t.translation.x >= 0.0);
    assert_eq!(t.translation.y, 0.0);
    assert_eq!(t.translation.z, 0.0);
}
