mod config_cmd;
mod refresh;
mod sensors;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::ApiClient;
use crate::config::Config;

pub use refresh::format_refresh;
pub use sensors::{format_sensor_detail, format_sensor_table};
pub use status::format_status;

#[derive(Parser)]
#[command(name = "fulcrum-tracker-cli")]
#[command(about = "Inspect and refresh a running Fulcrum Tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Tracker base URL, overrides the config file
    #[arg(long, global = true, env = "FULCRUM_TRACKER_URL")]
    url: Option<String>,

    /// Path to configuration file
    #[arg(long, global = true, env = "FULCRUM_TRACKER_CLI_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show collection status and stored totals
    Status,

    /// List every sensor
    Sensors {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one sensor with its attributes
    Sensor {
        /// Sensor key, e.g. total_fulcrum_sessions
        key: String,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Trigger a manual full reload
    Refresh,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigSubcommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Show current configuration
    Show,

    /// Initialize configuration with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    fn client(&self) -> Result<ApiClient> {
        let config = Config::load(self.config.as_deref())?.with_base_url(self.url.clone());
        ApiClient::new(&config)
    }

    pub async fn execute(self) -> Result<()> {
        match &self.command {
            Commands::Status => status::show_status(&self.client()?).await,
            Commands::Sensors { json } => sensors::list_sensors(&self.client()?, *json).await,
            Commands::Sensor { key, json } => sensors::show_sensor(&self.client()?, key, *json).await,
            Commands::Refresh => refresh::trigger_refresh(&self.client()?).await,
            Commands::Config(subcmd) => match subcmd {
                ConfigSubcommands::Show => {
                    config_cmd::show_config(self.config.as_deref(), self.url.clone())
                }
                ConfigSubcommands::Init { force } => {
                    config_cmd::init_config(self.config.as_deref(), *force)
                }
            },
            Commands::Completions { shell } => {
                generate_completions(*shell);
                Ok(())
            }
        }
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
