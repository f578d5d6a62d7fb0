pub use crate::app::WallCliApp;

mod app {
    use anyhow::Result;
    use std::io::{self, Write};
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Arc;
    use wallcycle_core::*;

    pub struct WallCliApp {
        service: Arc<WallpaperService>,
        events: Receiver<WallpaperEvent>,
        scheduler: Option<SchedulerHandle>,
    }

    impl WallCliApp {
        pub fn with_service(service: Arc<WallpaperService>) -> Self {
            let (tx, events) = mpsc::channel();
            service.subscribe(Arc::new(tx));

            Self {
                service,
                events,
                scheduler: None,
            }
        }

        /// Starts background rotation. With `rotate_now` the first tick
        /// changes the wallpaper instead of waiting a full interval.
        pub fn initialize(&mut self, rotate_now: bool) -> Result<()> {
            let service = Arc::clone(&self.service);
            let scheduler = if rotate_now {
                RotationScheduler::due_immediately(service)
            } else {
                RotationScheduler::new(service)
            };
            let handle = scheduler.spawn(TICK_INTERVAL)?;
            self.scheduler = Some(handle);
            Ok(())
        }

        fn print_events(&self) {
            for event in self.events.try_iter() {
                match event {
                    WallpaperEvent::WallpaperChanged(record) => {
                        println!("* Wallpaper changed: {}", record.filename);
                    }
                    WallpaperEvent::CollectionUpdated(wallpapers) => {
                        println!("* Collection updated: {} wallpapers", wallpapers.len());
                    }
                }
            }
        }

        fn download_and_set(&self) {
            println!("Downloading a new wallpaper...");
            match self.service.download_and_set() {
                Ok(record) => println!("Set wallpaper: {}", record.path.display()),
                Err(e) => eprintln!("Failed to change wallpaper: {}", e),
            }
        }

        fn list(&self) {
            print_wallpapers(&self.service.list_wallpapers());
        }

        fn delete(&self) -> Result<()> {
            let wallpapers = self.service.list_wallpapers();
            if wallpapers.is_empty() {
                println!("No wallpapers to delete.");
                return Ok(());
            }
            print_wallpapers(&wallpapers);

            let input = prompt("Number to delete (empty to cancel): ")?;
            if input.is_empty() {
                return Ok(());
            }
            match input.parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| wallpapers.get(i)) {
                Some(view) => {
                    self.service.delete_wallpaper(&view.record.id)?;
                    println!("Deleted {}", view.record.filename);
                }
                None => println!("Invalid selection."),
            }
            Ok(())
        }

        fn toggle_auto_change(&self) -> Result<()> {
            let mut settings = self.service.settings();
            settings.auto_change_enabled = !settings.auto_change_enabled;
            self.service.update_settings(settings.clone())?;
            println!(
                "Auto change {}",
                if settings.auto_change_enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }

        fn show_menu(&self) {
            let settings = self.service.settings();
            let count = self.service.list_wallpapers().len();

            println!("\n=== WallCycle - Wallpaper Manager ===");
            println!(
                "Wallpapers: {}/{} | Auto change: {} every {}h",
                count,
                settings.max_wallpapers,
                if settings.auto_change_enabled { "on" } else { "off" },
                settings.change_interval_hours
            );
            println!("Directory: {}", self.service.wallpaper_directory().display());
            println!();
            println!("1. Download and set new wallpaper");
            println!("2. List wallpapers");
            println!("3. Delete a wallpaper");
            println!("4. Toggle auto change");
            println!("5. Open wallpaper directory");
            println!("6. Exit");
        }

        pub fn run(&mut self) -> Result<()> {
            loop {
                self.print_events();
                self.show_menu();

                let input = prompt("\nSelect an option (1-6): ")?;
                self.print_events();

                match input.as_str() {
                    "1" => self.download_and_set(),
                    "2" => self.list(),
                    "3" => {
                        if let Err(e) = self.delete() {
                            eprintln!("Failed to delete wallpaper: {}", e);
                        }
                    }
                    "4" => {
                        if let Err(e) = self.toggle_auto_change() {
                            eprintln!("Failed to update settings: {}", e);
                        }
                    }
                    "5" => {
                        if let Err(e) = self.service.open_wallpaper_directory() {
                            eprintln!("Failed to open directory: {}", e);
                        }
                    }
                    "6" => {
                        println!("Exiting WallCycle...");
                        break;
                    }
                    _ => println!("Invalid option. Please select 1-6."),
                }
            }

            if let Some(handle) = self.scheduler.take() {
                handle.stop();
            }
            Ok(())
        }
    }

    pub(crate) fn prompt(message: &str) -> Result<String> {
        print!("{}", message);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok("6".to_string());
        }
        Ok(input.trim().to_string())
    }

    pub fn print_wallpapers(wallpapers: &[WallpaperView]) {
        if wallpapers.is_empty() {
            println!("No wallpapers downloaded yet.");
            return;
        }
        for (i, view) in wallpapers.iter().enumerate() {
            println!("{}", format_wallpaper(i + 1, &view.record));
        }
    }

    pub fn format_wallpaper(index: usize, record: &WallpaperRecord) -> String {
        format!(
            "{:>3}. {}  {}  {:>8}  {}",
            index,
            &record.id[..record.id.len().min(8)],
            record.acquired_at.format("%Y-%m-%d %H:%M"),
            format_size(record.size_bytes),
            record.source_url
        )
    }

    pub fn format_settings(settings: &Settings) -> String {
        let mut out = format!(
            "auto_change_enabled:   {}\nchange_interval_hours: {}\nmax_wallpapers:        {}\ndownload_sources:",
            settings.auto_change_enabled, settings.change_interval_hours, settings.max_wallpapers
        );
        for source in &settings.download_sources {
            out.push_str(&format!("\n  - {}", source));
        }
        out
    }

    pub fn format_size(bytes: u64) -> String {
        const KB: f64 = 1024.0;
        let bytes = bytes as f64;
        if bytes >= KB * KB {
            format!("{:.1} MB", bytes / (KB * KB))
        } else {
            format!("{:.0} KB", bytes / KB)
        }
    }

}

pub use crate::app::{format_settings, format_size, format_wallpaper, print_wallpapers};
