use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_CONFIG_PATH, PanelConfig};
use crate::error::Result;
use crate::logging::{LogFormat, init_logging};
use crate::server;

#[derive(Debug, Parser)]
#[command(
    name = "terrapanel",
    about = "Web control panel for a Terraria dedicated server",
    version
)]
pub struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the game server and the control panel.
    Serve(ServeArgs),

    /// Write a default config file.
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),

    /// Load and validate a config file.
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Overrides `web.bind`.
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Overrides `web.static_dir`.
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct InitConfigArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub path: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CheckConfigArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => {
            init_logging(cli.log_format);
            let config = serve_config(&args)?;
            server::serve(&config)
        }
        Commands::InitConfig(args) => {
            PanelConfig::write_default(&args.path, args.force)?;
            println!(
                "Config generated at {}. Edit this file, then run `terrapanel serve`.",
                args.path.display()
            );
            Ok(())
        }
        Commands::CheckConfig(args) => {
            let config = PanelConfig::load(&args.config)?;
            println!("{}", summarize(&config));
            Ok(())
        }
    }
}

/// Config file plus command-line overrides.
pub fn serve_config(args: &ServeArgs) -> Result<PanelConfig> {
    let mut config = PanelConfig::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.web.bind = bind;
    }
    if let Some(dir) = &args.static_dir {
        config.web.static_dir = dir.clone();
    }
    Ok(config)
}

#[must_use]
pub fn summarize(config: &PanelConfig) -> String {
    format!(
        "config ok\n  game: {} -world {} -port {}\n  web: {} (static {})\n  discord: {}\n  commands: {}",
        config.game.binary_path.display(),
        config.game.world_path.display(),
        config.game.port,
        config.web.bind,
        config.web.static_dir.display(),
        if config.discord.enabled {
            "enabled"
        } else {
            "disabled"
        },
        config.commands.allowed.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanelError;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "terrapanel",
            "--log-format",
            "json",
            "serve",
            "--config",
            "panel.toml",
            "--bind",
            "127.0.0.1:9000",
        ])
        .expect("parse");
        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.config, PathBuf::from("panel.toml"));
        assert_eq!(args.bind, Some(SocketAddr::from(([127, 0, 0, 1], 9000))));
        assert_eq!(args.static_dir, None);
    }

    #[test]
    fn init_then_check_config() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("terrapanel.toml");
        run(Cli {
            log_format: LogFormat::Pretty,
            command: Commands::InitConfig(InitConfigArgs {
                path: path.clone(),
                force: false,
            }),
        })
        .expect("init");
        run(Cli {
            log_format: LogFormat::Pretty,
            command: Commands::CheckConfig(CheckConfigArgs { config: path }),
        })
        .expect("check");
    }

    #[test]
    fn check_config_reports_missing_file() {
        let dir = tempdir().expect("tempdir");
        let result = run(Cli {
            log_format: LogFormat::Pretty,
            command: Commands::CheckConfig(CheckConfigArgs {
                config: dir.path().join("absent.toml"),
            }),
        });
        assert!(matches!(result, Err(PanelError::MissingPath { .. })));
    }

    #[test]
    fn serve_overrides_apply_to_loaded_config() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("terrapanel.toml");
        PanelConfig::write_default(&path, false).expect("write");
        let config = serve_config(&ServeArgs {
            config: path,
            bind: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
            static_dir: Some(PathBuf::from("/srv/panel")),
        })
        .expect("config");
        assert_eq!(config.web.bind.port(), 0);
        assert_eq!(config.web.static_dir, PathBuf::from("/srv/panel"));
    }

    #[test]
    fn summary_mentions_allowlist() {
        let summary = summarize(&PanelConfig::default());
        assert!(summary.starts_with("config ok"));
        assert!(summary.contains("dusk, dawn, noon, midnight, save, hardReset"));
    }
}
