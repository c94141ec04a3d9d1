use cartera::cli::{run, Cli};
use clap::Parser;

fn main() -> std::process::ExitCode {
    env_logger::init();
    run(Cli::parse())
}
