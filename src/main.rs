use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ember_companion::{Config, Daemon};

/// Ember - wake-word voice companion for desk robots
#[derive(Parser)]
#[command(name = "ember", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.config/ember/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run without robot hardware; capability actions are logged no-ops
    #[arg(long, env = "EMBER_SIMULATE")]
    simulate: bool,

    /// Validate configuration and wiring, then exit
    #[arg(long)]
    dry_run: bool,

    /// Conversation profile name
    #[arg(short, long)]
    profile: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,ember_companion=info",
        1 => "info,ember_companion=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    if cli.simulate {
        config.robot.simulate = true;
    }
    if let Some(name) = cli.profile {
        config.profile.name = name;
    }

    config.validate()?;
    tracing::debug!(
        backend = %config.backend.kind,
        profile = %config.profile.name,
        simulate = config.robot.simulate,
        "loaded configuration"
    );

    if cli.dry_run {
        // Construct everything to prove the wiring, then stop
        let _ = Daemon::new(config)?;
        println!("configuration ok");
        return Ok(());
    }

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}
