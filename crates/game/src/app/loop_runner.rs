use std::process::ExitCode;

use tracing::{info, warn};

use super::autopilot::AutoPlayer;
use super::bootstrap::AppWiring;
use super::gameplay::{MissionSnapshot, MissionState, Session};
use crate::config::LoopSettings;

const PROGRESS_LOG_INTERVAL_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub unscaled_seconds: f64,
    pub mission: MissionSnapshot,
    pub player_actions: u32,
}

impl RunSummary {
    pub fn completed(&self) -> bool {
        self.mission.state == MissionState::Complete
    }
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let summary = run_headless(app.session, app.player, &app.settings);
    if summary.completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Fixed-timestep loop without a window: the autopilot plays until the mission
/// completes or the simulated time budget runs out.
pub(crate) fn run_headless(
    mut session: Session,
    mut player: AutoPlayer,
    settings: &LoopSettings,
) -> RunSummary {
    let target_tps = settings.target_tps.max(1);
    let fixed_dt_seconds = (1.0 / f64::from(target_tps)) as f32;
    let max_sim_seconds = f64::from(settings.max_sim_seconds.max(0.0));
    info!(target_tps, max_sim_seconds, "loop_config");

    let mut ticks = 0_u64;
    let mut next_progress_log = PROGRESS_LOG_INTERVAL_SECONDS;
    while session.mission_state() != MissionState::Complete
        && session.clock().unscaled_time() < max_sim_seconds
    {
        session.set_leader(Some(player.position()));
        player.step(fixed_dt_seconds, &mut session);
        session.tick(fixed_dt_seconds);
        ticks += 1;

        let now = session.clock().unscaled_time();
        if now >= next_progress_log {
            next_progress_log += PROGRESS_LOG_INTERVAL_SECONDS;
            info!(
                unscaled_seconds = now,
                active_fires = session.fire_registry().active_count(),
                injured_helped = session.injured_registry().helped(),
                injured_total = session.injured_registry().total(),
                mission = session.mission_state().as_token(),
                "sim_progress"
            );
        }
    }

    let summary = RunSummary {
        ticks,
        unscaled_seconds: session.clock().unscaled_time(),
        mission: session.mission_snapshot(),
        player_actions: player.actions_taken(),
    };
    if summary.completed() {
        info!(
            ticks = summary.ticks,
            unscaled_seconds = summary.unscaled_seconds,
            elapsed_seconds = summary.mission.elapsed_seconds.unwrap_or_default(),
            player_actions = summary.player_actions,
            "run_summary"
        );
    } else {
        warn!(
            ticks = summary.ticks,
            unscaled_seconds = summary.unscaled_seconds,
            mission = summary.mission.state.as_token(),
            active_fires = session.fire_registry().active_count(),
            injured_helped = session.injured_registry().helped(),
            injured_total = session.injured_registry().total(),
            "mission_incomplete"
        );
    }
    summary
}
