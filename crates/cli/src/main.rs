use std::process::ExitCode;

fn main() -> ExitCode {
    sofra_cli::run()
}
