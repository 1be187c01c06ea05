use std::process::ExitCode;

fn main() -> ExitCode {
    rescue_game::app::run()
}
