use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::Result;
use crate::registry::WorkerRegistry;

#[derive(Parser)]
#[command(name = "botherd")]
#[command(version = "0.1.0")]
#[command(about = "Supervises exchange trading bot workers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (default.toml, <env>.toml)
    #[arg(short, long, default_value = "config")]
    pub config: PathBuf,

    /// Override the bot script directory
    #[arg(short, long, env = "BOT_DIR")]
    pub bot_dir: Option<PathBuf>,

    /// Override the control API port
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Supervise the workers and serve the control API (default)
    Run,
    /// List the workers that would be started
    List,
}

impl Cli {
    /// Load the config directory and apply command-line overrides
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load_from(&self.config)?;
        if let Some(bot_dir) = &self.bot_dir {
            config.supervisor.bot_dir = bot_dir.clone();
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        Ok(config)
    }
}

/// Print the discovered workers
pub fn list_workers(config: &AppConfig) -> Result<()> {
    let registry = WorkerRegistry::new(
        &config.supervisor.bot_dir,
        &config.supervisor.script_extension,
    );
    let workers = registry.workers()?;

    println!(
        "{} workers in {}",
        workers.len(),
        registry.directory().display()
    );
    for worker in workers {
        println!("  {:<16} {}", worker.id, worker.script_path.display());
    }
    Ok(())
}
