use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dockboard::logging::init_logging;
use dockboard::{BoardConfig, DuplicatePolicy, ReplacePolicy};
use dockboard_server::BoardServer;

/// Shared real-time loading-dock scheduling board
#[derive(Parser, Debug)]
#[command(name = "dockboard-server")]
#[command(about = "Shared real-time loading-dock scheduling board", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file with a `[board]` table (defaults to ./dockboard.toml if present)
    #[arg(long, short, env = "DOCKBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(long, short)]
    port: Option<u16>,

    /// Schedule document (JSON array of rows)
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Task history file
    #[arg(long)]
    history: Option<PathBuf>,

    /// Monthly report output file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Directory with the board UI, served at /
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Reference timezone as minutes east of UTC
    #[arg(long, allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,

    /// Keep every repeat of an identical schedule row as its own task
    #[arg(long)]
    strict_unique: bool,

    /// Refuse board submissions based on an outdated version
    #[arg(long)]
    reject_stale: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<BoardConfig> {
        let mut config = match &self.config {
            Some(path) => BoardConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => BoardConfig::load().context("failed to load configuration")?,
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = &self.schedule {
            config.schedule_path = path.clone();
        }
        if let Some(path) = &self.history {
            config.history_path = path.clone();
        }
        if let Some(path) = &self.report {
            config.report_path = path.clone();
        }
        if let Some(dir) = &self.static_dir {
            config.static_dir = Some(dir.clone());
        }
        if let Some(offset) = self.utc_offset_minutes {
            config.utc_offset_minutes = offset;
        }
        if self.strict_unique {
            config.duplicate_policy = DuplicatePolicy::StrictUnique;
        }
        if self.reject_stale {
            config.replace_policy = ReplacePolicy::RejectStale;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(&config.log_level);

    BoardServer::start(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dockboard.toml");
        std::fs::write(&file, "[board]\nport = 4000\nlog_level = \"debug\"\n").unwrap();

        let cli = Cli::parse_from([
            "dockboard-server",
            "--config",
            file.to_str().unwrap(),
            "--port",
            "5000",
            "--utc-offset-minutes",
            "-240",
            "--reject-stale",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.utc_offset_minutes, -240);
        assert_eq!(config.replace_policy, ReplacePolicy::RejectStale);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Dedup);
    }

    #[test]
    fn out_of_range_offset_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dockboard.toml");
        std::fs::write(&file, "[board]\n").unwrap();

        let cli = Cli::parse_from([
            "dockboard-server",
            "--config",
            file.to_str().unwrap(),
            "--utc-offset-minutes",
            "1500",
        ]);
        assert!(cli.load_config().is_err());
    }
}
