use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};

use crate::plugins::core_sim::{LogState, SimState};

/// Marker for the entity whose XZ position drives chunk streaming.
#[derive(Component)]
pub struct Viewer;

/// Fly camera tuning.
#[derive(Resource)]
pub struct ViewerConfig {
    pub spawn: Vec3,
    pub speed: f32,
    pub boost: f32,
    pub sens_yaw: f32,
    pub sens_pitch: f32,
    pub pitch_min: f32,
    pub pitch_max: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            spawn: Vec3::new(0.0, 120.0, 0.0),
            speed: 60.0,
            boost: 4.0,
            sens_yaw: 0.003,
            sens_pitch: 0.003,
            pitch_min: (-85f32).to_radians(),
            pitch_max: 60f32.to_radians(),
        }
    }
}

#[derive(Resource, Default)]
pub struct ViewerLook {
    pub yaw: f32,
    pub pitch: f32,
    pub captured: bool,
}

/// Flies the viewer along a fixed heading when enabled; used for unattended runs.
#[derive(Resource)]
pub struct Autopilot {
    pub enabled: bool,
    pub heading: Vec2,
    pub speed: f32,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self { enabled: false, heading: Vec2::new(1.0, 0.35), speed: 80.0 }
    }
}

pub struct ViewerPlugin;
impl Plugin for ViewerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewerConfig>()
            .init_resource::<ViewerLook>()
            .init_resource::<Autopilot>() // respect pre-inserted Autopilot (e.g. from --autopilot)
            .add_systems(Startup, spawn_viewer)
            .add_systems(Update, (viewer_capture, viewer_look, fly_viewer).chain())
            .add_systems(FixedUpdate, (autopilot_viewer, log_viewer_each_second));
    }
}

fn spawn_viewer(mut commands: Commands, cfg: Res<ViewerConfig>, mut look: ResMut<ViewerLook>) {
    look.pitch = (-25f32).to_radians();
    let rotation = Quat::from_euler(EulerRot::YXZ, look.yaw, look.pitch, 0.0);
    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_translation(cfg.spawn).with_rotation(rotation),
            ..default()
        },
        Viewer,
    ));
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight { illuminance: 10_000.0, shadows_enabled: false, ..default() },
        transform: Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.4, 0.0)),
        ..default()
    });
}

fn viewer_capture(
    buttons: Res<ButtonInput<MouseButton>>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
    mut look: ResMut<ViewerLook>,
) {
    let Ok(mut win) = windows.get_single_mut() else { return; };
    let want = buttons.pressed(MouseButton::Right);
    if want && !look.captured {
        win.cursor.visible = false;
        win.cursor.grab_mode = CursorGrabMode::Locked;
        look.captured = true;
    } else if !want && look.captured {
        win.cursor.visible = true;
        win.cursor.grab_mode = CursorGrabMode::None;
        look.captured = false;
    }
}

fn viewer_look(
    cfg: Res<ViewerConfig>,
    mut look: ResMut<ViewerLook>,
    mut ev_motion: EventReader<MouseMotion>,
    mut q_viewer: Query<&mut Transform, With<Viewer>>,
) {
    if !look.captured {
        ev_motion.clear();
        return;
    }
    for m in ev_motion.read() {
        look.yaw -= m.delta.x * cfg.sens_yaw;
        look.pitch = (look.pitch - m.delta.y * cfg.sens_pitch).clamp(cfg.pitch_min, cfg.pitch_max);
    }
    let Ok(mut t) = q_viewer.get_single_mut() else { return; };
    t.rotation = Quat::from_euler(EulerRot::YXZ, look.yaw, look.pitch, 0.0);
}

fn fly_viewer(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    cfg: Res<ViewerConfig>,
    autopilot: Res<Autopilot>,
    mut q_viewer: Query<&mut Transform, With<Viewer>>,
) {
    if autopilot.enabled {
        return;
    }
    let Ok(mut t) = q_viewer.get_single_mut() else { return; };
    let forward = *t.forward();
    let right = *t.right();
    let mut dir = Vec3::ZERO;
    if keys.pressed(KeyCode::KeyW) { dir += forward; }
    if keys.pressed(KeyCode::KeyS) { dir -= forward; }
    if keys.pressed(KeyCode::KeyD) { dir += right; }
    if keys.pressed(KeyCode::KeyA) { dir -= right; }
    if keys.pressed(KeyCode::KeyE) { dir += Vec3::Y; }
    if keys.pressed(KeyCode::KeyQ) { dir -= Vec3::Y; }
    let boost = if keys.pressed(KeyCode::ShiftLeft) { cfg.boost } else { 1.0 };
    t.translation += dir.normalize_or_zero() * cfg.speed * boost * time.delta_seconds();
}

pub fn autopilot_viewer(
    time: Res<Time>,
    autopilot: Res<Autopilot>,
    mut q_viewer: Query<&mut Transform, With<Viewer>>,
) {
    if !autopilot.enabled {
        return;
    }
    let step = autopilot.heading.normalize_or_zero() * autopilot.speed * time.delta_seconds();
    for mut t in q_viewer.iter_mut() {
        t.translation += Vec3::new(step.x, 0.0, step.y);
    }
}

fn log_viewer_each_second(
    sim: Res<SimState>,
    mut log_state: ResMut<LogState>,
    q_viewer: Query<&Transform, With<Viewer>>,
) {
    if sim.tick == 0 || sim.tick % 60 != 0 { return; }
    let current_second = sim.tick / 60;
    if current_second == log_state.last_logged_second { return; }
    log_state.last_logged_second = current_second;
    if let Ok(t) = q_viewer.get_single() {
        info!("T+{}s tick={} viewer=({:.1},{:.1},{:.1})",
            current_second, sim.tick, t.translation.x, t.translation.y, t.translation.z);
    }
}
