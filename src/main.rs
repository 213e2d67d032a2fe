//! Settings Porter - export and import file-manager settings as one zip bundle
//!
//! Main entry point for the command line application.
//!
//! # Overview
//!
//! This binary drives the About screen commands from the terminal. It initializes:
//! - Configuration loading ([`ConfigManager`], `settings-porter.yaml` + `SETTINGS_PORTER_*`)
//! - Logging infrastructure (daily rotating file + optional console output)
//! - Tokio async runtime (bundle operations run on blocking workers)
//! - Settings stores ([`SettingsStores`]) and state management ([`StateManager`])
//! - The About screen controller ([`AboutController`]) with native dialogs
//!
//! # Execution Flow
//!
//! 1. Parse arguments and load the layered configuration
//! 2. Initialize logging in `<app data dir>/logs`
//! 3. Create the tokio runtime
//! 4. Open the settings stores in `<app data dir>/settings`
//! 5. Run the requested command; export and import without a path show a file picker
//! 6. Shutdown the tokio runtime with a 5s timeout

use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use settings_porter::ui::{AboutController, AboutLink, NativeDialogs, OperationOutcome};
use settings_porter::{APP_NAME, ConfigManager, SettingsStores, StateManager, VERSION};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "settings-porter", version, about)]
struct Cli {
    /// Directory containing settings-porter.yaml
    #[arg(long, env = "SETTINGS_PORTER_CONFIG_DIR")]
    config_dir: Option<Utf8PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Export all settings into a zip bundle
    Export {
        /// Destination file; a save dialog is shown when omitted
        destination: Option<Utf8PathBuf>,
    },
    /// Import settings from a zip bundle
    Import {
        /// Bundle to import; an open dialog is shown when omitted
        source: Option<Utf8PathBuf>,
    },
    /// Print version information
    Version {
        /// Also copy it to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Open the log folder
    OpenLogs,
    /// Open one of the About screen links in the browser
    Link {
        #[arg(value_enum)]
        link: AboutLink,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(ConfigManager::default_config_dir);
    let config_manager = ConfigManager::new(&config_dir)?;
    let mut config = config_manager.load_app_config()?;
    config.debug_mode |= cli.debug;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = settings_porter::logging::setup_logging(
        &config.log_dir(),
        APP_NAME,
        config.debug_mode,
        config.console_logging,
        config.log_format,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("settings-porter-worker")
        .build()?;

    let stores = SettingsStores::open(config.settings_dir())?;
    tracing::info!("Settings directory: {}", stores.settings_dir());

    let state_manager = Arc::new(StateManager::new());
    let controller = AboutController::new(NativeDialogs, state_manager, &stores, config);

    let result = run_command(&runtime, &controller, cli.command);

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result
}

fn run_command(
    runtime: &tokio::runtime::Runtime,
    controller: &AboutController<NativeDialogs>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Export { destination } => {
            let outcome = runtime.block_on(async {
                match destination {
                    Some(path) => controller.export_to(&path).await,
                    None => controller.export_settings().await,
                }
            });
            report_outcome("Exported settings to", outcome)
        }
        Command::Import { source } => {
            let outcome = runtime.block_on(async {
                match source {
                    Some(path) => controller.import_from(&path).await,
                    None => controller.import_settings().await,
                }
            });
            report_outcome("Imported settings from", outcome)
        }
        Command::Version { copy } => {
            println!("{}", controller.version_info());
            if copy {
                controller.copy_version_info();
            }
            Ok(())
        }
        Command::OpenLogs => controller.open_log_location(),
        Command::Link { link } => controller.open_link(link),
    }
}

fn report_outcome(verb: &str, outcome: OperationOutcome) -> Result<()> {
    match outcome {
        OperationOutcome::Completed { archive } => {
            println!("{} {}", verb, archive);
            Ok(())
        }
        OperationOutcome::Cancelled => {
            println!("Cancelled");
            Ok(())
        }
        OperationOutcome::Busy => bail!("Another bundle operation is in progress"),
        OperationOutcome::Failed(message) => bail!(message),
    }
}
