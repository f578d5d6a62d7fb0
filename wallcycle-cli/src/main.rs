use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use wallcycle_cli::{format_settings, print_wallpapers, WallCliApp};
use wallcycle_core::{Config, WallpaperService};

#[derive(Parser)]
#[command(name = "wallcycle")]
#[command(about = "WallCycle - downloads and rotates desktop wallpapers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive menu with background rotation (default)
    Run {
        /// Change the wallpaper on the first rotation tick
        #[arg(long)]
        now: bool,
    },
    /// List downloaded wallpapers, newest first
    List,
    /// Show or change settings
    Settings {
        #[arg(long)]
        auto_change: Option<bool>,
        #[arg(long)]
        interval_hours: Option<u32>,
        #[arg(long)]
        max_wallpapers: Option<usize>,
        /// Replaces the source list; repeat for several sources
        #[arg(long = "source")]
        sources: Vec<String>,
    },
    /// Download a new wallpaper and set it
    Download,
    /// Set an existing image file as the wallpaper
    Set { path: PathBuf },
    /// Delete a downloaded wallpaper by id
    Delete { id: String },
    /// Print the size of an image's data URI preview
    Preview { path: PathBuf },
    /// Print the wallpaper directory
    Dir {
        /// Open it in the file manager instead
        #[arg(long)]
        open: bool,
    },
}

fn init_logging() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = Config::new().context("Failed to resolve wallcycle directories")?;
    log::debug!(
        "Using config dir {} and wallpaper dir {}",
        config.config_dir.display(),
        config.wallpaper_dir.display()
    );
    let service = Arc::new(WallpaperService::new(config));

    match cli.command.unwrap_or(Command::Run { now: false }) {
        Command::Run { now } => {
            let mut app = WallCliApp::with_service(service);
            app.initialize(now)?;
            println!("WallCycle started successfully!");
            app.run()?;
        }
        Command::List => print_wallpapers(&service.list_wallpapers()),
        Command::Settings {
            auto_change,
            interval_hours,
            max_wallpapers,
            sources,
        } => {
            let mut settings = service.settings();
            let changed = auto_change.is_some() || interval_hours.is_some() || max_wallpapers.is_some() || !sources.is_empty();

            if let Some(enabled) = auto_change {
                settings.auto_change_enabled = enabled;
            }
            if let Some(hours) = interval_hours {
                settings.change_interval_hours = hours;
            }
            if let Some(max) = max_wallpapers {
                settings.max_wallpapers = max;
            }
            if !sources.is_empty() {
                settings.download_sources = sources;
            }
            if changed {
                service.update_settings(settings)?;
            }

            println!("{}", format_settings(&service.settings()));
        }
        Command::Download => {
            let record = service.download_and_set()?;
            println!("Set wallpaper: {}", record.path.display());
        }
        Command::Set { path } => {
            service.set_wallpaper(&path)?;
            println!("Set wallpaper: {}", path.display());
        }
        Command::Delete { id } => {
            service.delete_wallpaper(&id)?;
            println!("Deleted {}", id);
        }
        Command::Preview { path } => {
            let uri = service.wallpaper_preview(&path)?;
            let prefix = uri.split(',').next().unwrap_or_default();
            println!("{} ({} bytes)", prefix, uri.len());
        }
        Command::Dir { open } => {
            if open {
                service.open_wallpaper_directory()?;
            } else {
                println!("{}", service.wallpaper_directory().display());
            }
        }
    }

    Ok(())
}
