mod builtins;
mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hookwise_core::kernel::bootstrap::Application;
use hookwise_core::storage::HostConfig;
use hookwise_core::{CallContext, KernelError};
use log::{error, info};

/// Hookwise: plugin and hook orchestration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Print "pong" and exit
    #[arg(long)]
    ping: bool,

    /// Host configuration file (.json, .toml, .yaml)
    #[arg(long, global = true, conflicts_with = "home")]
    config: Option<PathBuf>,

    /// Host directory holding plugins/, core_plugin/ and settings.json
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
    /// Show which plugins implement which hooks and tools
    Hooks,
    /// Execute a hook; the first argument is piped through every implementation
    Run {
        /// Hook name
        hook: String,
        /// Arguments, parsed as JSON when possible
        args: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// List discovered plugins
    List,
    /// Activate or deactivate a plugin
    Toggle {
        /// Plugin id
        id: String,
    },
    /// Install a plugin from a .tar.gz archive
    Install {
        /// Archive path
        archive: PathBuf,
    },
    /// Remove a plugin from disk
    Uninstall {
        /// Plugin id
        id: String,
    },
}

fn host_config(args: &CliArgs) -> Result<HostConfig, KernelError> {
    if let Some(path) = &args.config {
        return HostConfig::load(path);
    }
    let home = match &args.home {
        Some(home) => home.clone(),
        None => std::env::current_dir().map_err(|e| KernelError::io(e, "current_dir", PathBuf::from(".")))?,
    };
    Ok(HostConfig::from_dir(&home))
}

async fn run_command(app: &Application, command: Option<Commands>) -> Result<(), KernelError> {
    let registry = app.registry();
    match command {
        Some(Commands::Plugin { command }) => match command {
            PluginCommand::List => {
                println!("Plugins:");
                cli::print_plugins(&registry.plugins().await);
            }
            PluginCommand::Toggle { id } => {
                let state = registry.toggle(&id).await?;
                println!("Plugin '{}' is now {}", id, state);
            }
            PluginCommand::Install { archive } => {
                let id = registry.install(&archive).await?;
                println!("Installed plugin '{}'", id);
            }
            PluginCommand::Uninstall { id } => {
                registry.uninstall(&id).await?;
                println!("Uninstalled plugin '{}'", id);
            }
        },
        Some(Commands::Hooks) => {
            cli::print_layout(&registry.snapshot().layout())
                .map_err(|e| KernelError::Other(format!("Cannot render hook layout: {}", e)))?;
        }
        Some(Commands::Run { hook, args }) => {
            let args = cli::parse_hook_args(&args);
            match app.dispatcher().execute(&hook, args, &CallContext::new()).await? {
                Some(value) => println!("{}", value),
                None => println!("Hook '{}' executed", hook),
            }
        }
        None => {
            println!("Plugins:");
            cli::print_plugins(&registry.plugins().await);
            if app.dispatcher().has_hook("on_ready") {
                app.dispatcher().notify("on_ready", &CallContext::new()).await?;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = match host_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load host configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Using plugins root {}", config.plugins_root.display());

    if let Err(e) = builtins::seed_core_plugin(&config.core_plugin_dir) {
        error!("Cannot create built-in plugin at {}: {}", config.core_plugin_dir.display(), e);
    }

    let mut app = Application::new(config);
    builtins::register(app.catalog());
    if let Err(e) = app.start().await {
        eprintln!("Failed to start: {}", e);
        return ExitCode::FAILURE;
    }

    match run_command(&app, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
