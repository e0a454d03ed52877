use clap::Parser;
use indiforge::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
