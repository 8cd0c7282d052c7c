use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use bevy::diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin};

use terrain_streamer::plugins::core_sim::{CoreSimPlugin, RunConfig};
use terrain_streamer::plugins::terrain::{TerrainPlugin, TerrainRenderPlugin};
use terrain_streamer::plugins::terrain_settings::TerrainSettings;
use terrain_streamer::plugins::viewer::{Autopilot, ViewerPlugin};
use terrain_streamer::preview::{write_preview, PreviewMode};

const SETTINGS_PATH: &str = "assets/terrain.ron";

fn load_settings() -> TerrainSettings {
    match TerrainSettings::load(SETTINGS_PATH) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("TERRAIN settings_fallback path={SETTINGS_PATH} error={e}");
            TerrainSettings::default()
        }
    }
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

fn run_preview(args: &[String], settings: &TerrainSettings) -> std::process::ExitCode {
    let Some(i) = args.iter().position(|a| a == "--preview") else {
        return std::process::ExitCode::SUCCESS;
    };
    let (Some(mode), Some(path)) = (args.get(i + 1), args.get(i + 2)) else {
        eprintln!("usage: --preview <noise|falloff> <path.png>");
        return std::process::ExitCode::FAILURE;
    };
    let result = mode
        .parse::<PreviewMode>()
        .and_then(|mode| write_preview(mode, settings, path));
    match result {
        Ok(()) => {
            println!("PREVIEW saved path={path}");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("PREVIEW failed error={e}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn main() -> std::process::ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let mut settings = load_settings();
    settings.validate();

    if args.iter().any(|a| a == "--preview") {
        return run_preview(&args, &settings);
    }

    let run_duration_seconds = arg_value(&args, "--runtime").and_then(|v| v.parse::<f32>().ok());
    let autopilot = Autopilot {
        enabled: args.iter().any(|a| a == "--autopilot"),
        ..default()
    };

    let exit = App::new()
        .insert_resource(ClearColor(Color::srgb(0.52, 0.80, 0.92)))
        .insert_resource(Msaa::Sample4)
        .insert_resource(AmbientLight {
            color: Color::srgb(0.55, 0.55, 0.60),
            brightness: 800.0,
        })
        .insert_resource(settings)
        .insert_resource(RunConfig { run_duration_seconds })
        .insert_resource(autopilot)
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window { title: "Terrain Streamer".into(), ..default() }),
            ..default()
        }))
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        .add_plugins(CoreSimPlugin)       // timing + run control
        .add_plugins(ViewerPlugin)        // fly camera / autopilot
        .add_plugins(TerrainPlugin)       // chunk streaming
        .add_plugins(TerrainRenderPlugin) // chunk entities, colliders, forest
        .add_plugins(FrameTimeDiagnosticsPlugin)
        .add_plugins(LogDiagnosticsPlugin::default())
        .run();
    if exit.is_success() { std::process::ExitCode::SUCCESS } else { std::process::ExitCode::FAILURE }
}
