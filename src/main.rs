use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kestrel_device::{Config, ConfigOverrides, Daemon, DeviceRegistration, PluginRegistry};

/// Kestrel - device controller for embedded voice assistants
#[derive(Parser)]
#[command(name = "kestrel", version, about)]
struct Cli {
    /// Device model id registered with the cloud project
    #[arg(long, visible_alias = "device_model_id", env = "KESTREL_DEVICE_MODEL_ID")]
    device_model_id: Option<String>,

    /// Project id used to register this device
    #[arg(long, visible_alias = "project_id", env = "KESTREL_PROJECT_ID")]
    project_id: Option<String>,

    /// Nickname used to register this device
    #[arg(long, env = "KESTREL_NICKNAME")]
    nickname: Option<String>,

    /// Path to store and read the device registration
    #[arg(long, env = "KESTREL_DEVICE_CONFIG")]
    device_config: Option<PathBuf>,

    /// Path to the OAuth2 credentials file
    #[arg(long, env = "KESTREL_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Plugins to load, in dispatch order
    #[arg(long, num_args = 1.., value_delimiter = ',', env = "KESTREL_PLUGINS")]
    plugins: Option<Vec<String>>,

    /// Assistant bridge executable
    #[arg(long, env = "KESTREL_ASSISTANT_COMMAND")]
    assistant_command: Option<PathBuf>,

    /// Config file (defaults to ~/.config/kestrel/config.toml)
    #[arg(long, env = "KESTREL_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List the available plugins
    Plugins,
    /// Show the persisted device registration
    Device,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            device_model_id: self.device_model_id.clone(),
            project_id: self.project_id.clone(),
            nickname: self.nickname.clone(),
            device_config: self.device_config.clone(),
            credentials: self.credentials.clone(),
            plugins: self.plugins.clone(),
            assistant_command: self.assistant_command.clone(),
            config_file: self.config.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,kestrel_device=info",
        1 => "info,kestrel_device=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
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
    let config = Config::load(cli.overrides());

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Plugins => {
                list_plugins();
                Ok(())
            }
            Command::Device => show_device(&config),
        };
    }

    tracing::info!(
        device_config = %config.device_config.display(),
        plugins = ?config.plugins,
        "starting kestrel"
    );
    tracing::debug!(?config, "loaded configuration");

    let stats = Daemon::new(config).run().await?;

    tracing::info!(
        events = stats.events,
        plugin_failures = stats.plugin_failures,
        "kestrel stopped"
    );
    Ok(())
}

/// List the available plugins
fn list_plugins() {
    for name in PluginRegistry::builtin().names() {
        println!("{name}");
    }
}

/// Show the persisted device registration
fn show_device(config: &Config) -> anyhow::Result<()> {
    match DeviceRegistration::load(&config.device_config)? {
        Some(registration) => {
            println!("Device Model ID: {}", registration.model_id);
            println!("Project ID: {}", registration.project_id);
            println!(
                "Device ID: {}",
                registration.last_device_id.as_deref().unwrap_or("(never registered)")
            );
        }
        None => println!(
            "No device registration at {}",
            config.device_config.display()
        ),
    }
    Ok(())
}
