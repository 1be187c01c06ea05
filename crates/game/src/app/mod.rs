use std::process::ExitCode;

use tracing::error;

mod autopilot;
pub mod bootstrap;
pub mod gameplay;
pub mod loop_runner;
pub mod scenario;

pub fn run() -> ExitCode {
    match bootstrap::build_app() {
        Ok(app) => loop_runner::run(app),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
