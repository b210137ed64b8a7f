use clap::Parser;

mod cli;
mod control;
mod cursor;
mod estimate;
mod telemetry;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    cli::dispatch(cli)
}
