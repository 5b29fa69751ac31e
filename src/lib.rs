#[cfg(feature = "audio")]
pub mod audio;
mod commands;
pub mod db;
pub mod models;
pub mod player;
pub mod settings;
mod utils;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use log::info;

use commands::{AppState, Cli};
use db::Database;
use settings::SettingsStore;

pub use commands::format_time;

fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "intervals")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("no home directory found; pass --data-dir"))
}

pub fn run() -> Result<()> {
    // Quiet by default so log lines do not interleave with the player output.
    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(log::LevelFilter::Warn);
    }
    logger.init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let database = Database::new(data_dir.join("intervals.sqlite3"))?;
        let seeded = database.seed_default_workouts().await?;
        if seeded > 0 {
            info!("Seeded {seeded} default workouts");
        }

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let state = AppState {
            db: database,
            settings,
        };

        commands::dispatch(&state, cli.command).await
    })
}
