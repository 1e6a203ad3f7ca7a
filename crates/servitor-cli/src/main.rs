//! Servitor command-line driver
//!
//! Runs one actor per target from an `.act` script and exits once every actor
//! has terminated.

use anyhow::Context;
use clap::Parser;
use servitor_engine::RuntimeConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "servitor")]
#[command(about = "Run scripted actors on a multi-threaded scheduler", long_about = None)]
#[command(version)]
struct Cli {
    /// Actor script run once per target
    #[arg(short, long, default_value = "servo.act")]
    script: PathBuf,

    /// TOML runtime configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads (0 = CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Capacity of both the run queue and the pending-operation queue
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the effective runtime configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Seed urls, one actor each
    targets: Vec<String>,
}

impl Cli {
    /// Defaults, then the config file, then flags.
    fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RuntimeConfig::default(),
        };
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(capacity) = self.queue_capacity {
            config = config.with_queue_capacity(capacity);
        }
        config.validate()?;
        Ok(config)
    }

    /// Directory scripts are resolved against, and the seed script's name in it.
    fn script_location(&self) -> anyhow::Result<(PathBuf, String)> {
        let name = self
            .script
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("invalid script path {}", self.script.display()))?
            .to_string();
        let root = match self.script.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        Ok((root, name))
    }
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose))),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.runtime_config()?;
    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    let (root, script) = cli.script_location()?;
    tracing::debug!(
        root = %root.display(),
        script = %script,
        workers = config.effective_workers(),
        targets = cli.targets.len(),
        "starting"
    );

    servitor_runtime::run_targets(config, &root, &script, &cli.targets)
        .with_context(|| format!("running {}", cli.script.display()))?;
    Ok(())
}
