//! The binary entry point for the Verdant terrain streamer.

use clap::Parser;
use tracing::{error, info};
use verdant_app::platform::PlatformDirs;
use verdant_app::{AppError, Summary};
use verdant_config::{CliArgs, Config};

fn main() {
    let args = CliArgs::parse();
    if let Err(e) = run(&args) {
        error!("{e}");
        eprintln!("verdant: {e}");
        std::process::exit(1);
    }
}

fn run(args: &CliArgs) -> Result<(), AppError> {
    let dirs = PlatformDirs::from_override(args.config.as_deref())?;
    dirs.create_dirs()?;

    let mut config = Config::load_or_create(&dirs.config_dir)?;
    config.apply_cli_overrides(args);

    verdant_log::init_logging(
        Some(dirs.log_dir.as_path()),
        cfg!(debug_assertions),
        Some(&config),
    );
    info!(
        config = %dirs.config_dir.display(),
        logs = %dirs.log_dir.display(),
        "verdant starting"
    );

    let summary = verdant_app::run(&config)?;
    report(&summary);
    Ok(())
}

fn report(summary: &Summary) {
    info!(
        ticks = summary.ticks,
        distance = summary.distance,
        created = summary.created,
        ready = summary.ready,
        destroyed = summary.destroyed,
        live = summary.live_nodes,
        finals = summary.final_nodes,
        props = summary.props,
        flooded = summary.flooded_chunks,
        "session finished"
    );
}
