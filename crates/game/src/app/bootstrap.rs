use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::autopilot::AutoPlayer;
use super::gameplay::Session;
use super::scenario::{build_scenario, ScenarioError};
use crate::config::{ConfigError, LoopSettings, MissionConfig, MISSION_CONFIG_ENV_VAR};
use crate::presentation::TracingPresentation;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build scenario: {0}")]
    Scenario(#[from] ScenarioError),
}

pub(crate) struct AppWiring {
    pub(crate) settings: LoopSettings,
    pub(crate) session: Session,
    pub(crate) player: AutoPlayer,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Rescue Sim Startup ===");

    let config = MissionConfig::from_env()?;
    let config_source =
        std::env::var(MISSION_CONFIG_ENV_VAR).unwrap_or_else(|_| "defaults".to_string());
    info!(
        config_source = %config_source,
        custom_scenario = config.scenario.is_some(),
        "mission_config_loaded"
    );
    let settings = config.run.clone();
    let scenario = build_scenario(config, Box::new(TracingPresentation))?;
    let player = AutoPlayer::new(scenario.player, scenario.navmesh);

    Ok(AppWiring {
        settings,
        session: scenario.session,
        player,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
