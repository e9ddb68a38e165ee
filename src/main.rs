use chrono::Utc;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tracing_appender::non_blocking::NonBlockingBuilder;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::Layer as FmtLayer;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

mod client;
mod common;
mod config;
mod service;
mod util;
mod vojo;

use crate::config::app_config::AppConfig;
use crate::service::alert_config_service;
use crate::service::channel_service;
use crate::service::cleanup_service;
use crate::service::dashboard_service;
use crate::service::event_service;
use crate::service::website_service;
use crate::vojo::migration_tally::MigrationTally;

#[macro_use]
extern crate tracing;
#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate serde_json;

#[derive(Parser)]
#[command(name = "confmig")]
#[command(about = "Migrate configuration objects between monitoring backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Path to the YAML configuration file
    #[arg(long)]
    pub config_file: Option<String>,
    /// URL of the source backend
    #[arg(long)]
    pub source_url: Option<String>,
    /// API token for the source backend
    #[arg(long)]
    pub source_token: Option<String>,
    /// URL of the target backend
    #[arg(long)]
    pub target_url: Option<String>,
    /// API token for the target backend
    #[arg(long)]
    pub target_token: Option<String>,
    /// Disable TLS certificate verification
    #[arg(long)]
    pub no_verify_ssl: bool,
    /// Where to read source objects from (api or file)
    #[arg(long)]
    pub objects_source: Option<String>,
    /// Path of the local JSON cache file
    #[arg(long)]
    pub objects_file_path: Option<String>,
    /// Default owner id for dashboards whose owner cannot be mapped
    #[arg(long)]
    pub default_owner_id: Option<String>,
    /// What to do with duplicates (ask, update or skip)
    #[arg(long)]
    pub on_duplicate: Option<String>,
    /// Maximum concurrent API requests
    #[arg(long)]
    pub max_concurrent: Option<usize>,
    /// API requests per second limit
    #[arg(long)]
    pub rate_limit: Option<u32>,
    /// Timeout per request in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,
    /// Number of retry attempts for failed requests
    #[arg(long)]
    pub retry_attempts: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate custom event specifications
    Events {
        #[command(flatten)]
        args: MigrateArgs,
    },

    /// Migrate alert channels
    Channels {
        #[command(flatten)]
        args: MigrateArgs,
    },

    /// Migrate alert configurations
    Configs {
        #[command(flatten)]
        args: MigrateArgs,
    },

    /// Migrate website monitoring configurations
    Websites {
        #[command(flatten)]
        args: MigrateArgs,
    },

    /// Migrate custom dashboards with the concurrent pipeline
    CustomDashboards {
        #[command(flatten)]
        args: MigrateArgs,
    },

    /// Delete all custom dashboards from the target backend
    DeleteDashboards {
        #[command(flatten)]
        args: MigrateArgs,
    },
}

#[tokio::main]
async fn main() {
    let code = match main_with_error().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Unexpected error: {:#}", err);
            1
        }
    };
    std::process::exit(code);
}

async fn main_with_error() -> Result<i32, anyhow::Error> {
    let cli = Cli::parse();
    let args = match &cli.command {
        Commands::Events { args }
        | Commands::Channels { args }
        | Commands::Configs { args }
        | Commands::Websites { args }
        | Commands::CustomDashboards { args }
        | Commands::DeleteDashboards { args } => args,
    };

    let mut app_config = AppConfig::load_config(args.config_file.as_deref())?;
    let _work_guard = setup_logger(&app_config)?;
    app_config.apply_overrides(args);

    let code = match cli.command {
        Commands::Events { .. } => exit_code_for(event_service::migrate(&app_config).await?),
        Commands::Channels { .. } => exit_code_for(channel_service::migrate(&app_config).await?),
        Commands::Configs { .. } => {
            exit_code_for(alert_config_service::migrate(&app_config).await?)
        }
        Commands::Websites { .. } => exit_code_for(website_service::migrate(&app_config).await?),
        Commands::CustomDashboards { .. } => {
            exit_code_for(dashboard_service::migrate(&app_config).await?)
        }
        Commands::DeleteDashboards { .. } => {
            cleanup_service::delete_all_dashboards(&app_config).await?;
            0
        }
    };
    Ok(code)
}

/// A run that moved nothing over is a failure for the calling automation.
fn exit_code_for(tally: MigrationTally) -> i32 {
    if tally.has_changes() {
        0
    } else {
        1
    }
}

struct UtcTime;

impl FormatTime for UtcTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

fn setup_logger(app_config: &AppConfig) -> Result<WorkerGuard, anyhow::Error> {
    let app_file = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("confmig")
        .filename_suffix("log")
        .max_log_files(7)
        .build("./logs")?;
    let (non_blocking_appender, guard) = NonBlockingBuilder::default()
        .buffered_lines_limit(10)
        .finish(app_file);
    let app_file_layer = tracing_subscriber::fmt::Layer::new()
        .with_timer(UtcTime)
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_appender)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    let console_layer = FmtLayer::new()
        .with_timer(UtcTime)
        .with_target(true)
        .with_ansi(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);

    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(app_file_layer);
    let show_console = app_config
        .logging
        .clone()
        .unwrap_or_default()
        .console
        .unwrap_or(true);

    if show_console {
        subscriber.with(console_layer).init();
    } else {
        subscriber.init();
    }

    Ok(guard)
}
