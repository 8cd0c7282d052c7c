use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::time::Fixed;

// Core simulation timing & run control.
#[derive(Resource, Default, Debug)]
pub struct SimState {
    pub tick: u64,
    pub elapsed_seconds: f32,
}
impl SimState {
    pub fn advance_fixed(&mut self) {
        self.tick += 1;
        self.elapsed_seconds = self.tick as f32 / 60.0;
    }
}

/// Unattended run length. `None` runs until the window closes.
#[derive(Resource, Default)]
pub struct RunConfig {
    pub run_duration_seconds: Option<f32>,
}

#[derive(Resource, Default)]
pub struct LogState { pub last_logged_second: u64 }

#[derive(Resource, Default)]
pub struct ExitState { pub triggered: bool }

pub struct CoreSimPlugin;
impl Plugin for CoreSimPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SimState::default())
            .init_resource::<RunConfig>() // respect pre-inserted RunConfig (e.g. from --runtime flag)
            .insert_resource(LogState::default())
            .insert_resource(ExitState::default())
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            .add_systems(FixedUpdate, tick_state)
            .add_systems(Update, exit_after_runtime);
    }
}

fn tick_state(mut sim: ResMut<SimState>) {
    sim.advance_fixed();
}

fn exit_after_runtime(
    sim: Res<SimState>,
    run: Res<RunConfig>,
    mut exit_state: ResMut<ExitState>,
    mut ev_exit: EventWriter<AppExit>,
) {
    if exit_state.triggered { return; }
    let Some(limit) = run.run_duration_seconds else { return; };
    if sim.elapsed_seconds >= limit {
        info!("EXIT runtime reached seconds={}", sim.elapsed_seconds);
        exit_state.triggered = true;
        ev_exit.send(AppExit::Success);
    }
}
