//! Desktop background setters.
//!
//! The core only relies on [`BackgroundSetter`]; [`platform_default`] picks the
//! chain of mechanisms for the running OS.

use log::{debug, info, warn};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, WallpaperError};

pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

/// Environment variable carrying the image path to script-based setters.
pub const PATH_ENV: &str = "WALLCYCLE_WALLPAPER";

/// Service trait for setting the desktop background.
pub trait BackgroundSetter: Send + Sync {
    fn name(&self) -> &str;
    fn set_background(&self, path: &Path) -> Result<()>;
}

/// Uses the `wallpaper` crate, which knows the common desktops natively.
pub struct WallpaperCrateSetter;

impl BackgroundSetter for WallpaperCrateSetter {
    fn name(&self) -> &str {
        "wallpaper"
    }

    fn set_background(&self, path: &Path) -> Result<()> {
        let file_loc = path.to_string_lossy();
        wallpaper::set_from_path(&file_loc).map_err(|e| WallpaperError::ApplyFailed(e.to_string()))
    }
}

/// Runs one or more external commands; `{path}` and `{uri}` in arguments are
/// replaced with the file path and its `file://` URI.
///
/// Script interpreters must not see the path inside their source text; use
/// [`CommandSetter::with_path_env`] and read it from the environment instead.
pub struct CommandSetter {
    name: String,
    commands: Vec<Vec<String>>,
    timeout: Duration,
    path_env: Option<&'static str>,
}

impl CommandSetter {
    pub fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            commands: Vec::new(),
            timeout: COMMAND_TIMEOUT,
            path_env: None,
        }
        .then(program, args)
    }

    /// Adds a command that runs after the previous ones succeed.
    pub fn then(mut self, program: &str, args: &[&str]) -> Self {
        let mut command = vec![program.to_string()];
        command.extend(args.iter().map(|a| a.to_string()));
        self.commands.push(command);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Exports the image path to every command as `var`.
    pub fn with_path_env(mut self, var: &'static str) -> Self {
        self.path_env = Some(var);
        self
    }

    fn expand(arg: &str, path: &Path) -> String {
        let file_loc = path.to_string_lossy();
        arg.replace("{uri}", &format!("file://{}", file_loc))
            .replace("{path}", &file_loc)
    }
}

impl BackgroundSetter for CommandSetter {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_background(&self, path: &Path) -> Result<()> {
        for command in &self.commands {
            let (program, args) = command
                .split_first()
                .ok_or_else(|| WallpaperError::ApplyFailed(format!("{}: empty command", self.name)))?;
            let mut cmd = Command::new(program);
            cmd.args(args.iter().map(|a| Self::expand(a, path)));
            if let Some(var) = self.path_env {
                cmd.env(var, path);
            }
            run_with_timeout(&mut cmd, self.timeout)
                .map_err(|e| WallpaperError::ApplyFailed(format!("{}: {}", program, e)))?;
        }
        Ok(())
    }
}

/// Tries each setter in order and succeeds on the first that does.
pub struct ChainSetter {
    setters: Vec<Box<dyn BackgroundSetter>>,
}

impl ChainSetter {
    pub fn new(setters: Vec<Box<dyn BackgroundSetter>>) -> Self {
        Self { setters }
    }
}

impl BackgroundSetter for ChainSetter {
    fn name(&self) -> &str {
        "chain"
    }

    fn set_background(&self, path: &Path) -> Result<()> {
        let mut failures = Vec::new();
        for setter in &self.setters {
            match setter.set_background(path) {
                Ok(()) => {
                    info!("Wallpaper set via {}: {}", setter.name(), path.display());
                    return Ok(());
                }
                Err(e) => {
                    debug!("{} could not set wallpaper: {}", setter.name(), e);
                    failures.push(setter.name().to_string());
                }
            }
        }

        Err(WallpaperError::ApplyFailed(if failures.is_empty() {
            "no wallpaper mechanism available".to_string()
        } else {
            format!("all mechanisms failed ({})", failures.join(", "))
        }))
    }
}

/// Runs `cmd` to completion, killing it once `timeout` elapses.
fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> std::result::Result<(), String> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| e.to_string())?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait().map_err(|e| e.to_string())? {
            Some(status) if status.success() => return Ok(()),
            Some(status) => return Err(format!("exited with {}", status)),
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("timed out after {}s", timeout.as_secs()));
            }
            None => thread::sleep(Duration::from_millis(50)),
        }
    }
}

pub fn get_desktop_environment() -> String {
    if let Ok(desktop_session) = std::env::var("DESKTOP_SESSION") {
        let session = desktop_session.to_lowercase();
        if ["gnome", "unity", "cinnamon", "mate", "xfce4", "lxde", "kde"].contains(&session.as_str()) {
            return session;
        }

        if session.contains("xfce") || session.starts_with("xubuntu") {
            return "xfce4".to_string();
        } else if session.starts_with("ubuntustudio") || session.starts_with("kubuntu") {
            return "kde".to_string();
        } else if session.starts_with("ubuntu") {
            return "gnome".to_string();
        } else if session.starts_with("lubuntu") {
            return "lxde".to_string();
        }
    }

    if std::env::var("KDE_FULL_SESSION").unwrap_or_default() == "true" {
        return "kde".to_string();
    }

    if std::env::var("GNOME_DESKTOP_SESSION_ID").is_ok() {
        return "gnome".to_string();
    }

    "unknown".to_string()
}

fn gnome_setter() -> CommandSetter {
    CommandSetter::new(
        "gsettings",
        "gsettings",
        &["set", "org.gnome.desktop.background", "picture-uri", "{uri}"],
    )
    .then("gsettings", &["set", "org.gnome.desktop.background", "picture-uri-dark", "{uri}"])
}

/// The native mechanism for a detected desktop, when there is one.
fn desktop_setter(desktop_env: &str) -> Option<CommandSetter> {
    let setter = match desktop_env {
        "gnome" | "unity" => gnome_setter(),
        "cinnamon" => CommandSetter::new(
            "gsettings-cinnamon",
            "gsettings",
            &["set", "org.cinnamon.desktop.background", "picture-uri", "{uri}"],
        ),
        "mate" => CommandSetter::new(
            "gsettings-mate",
            "gsettings",
            &["set", "org.mate.background", "picture-filename", "{path}"],
        ),
        "xfce4" => CommandSetter::new(
            "xfconf-query",
            "xfconf-query",
            &["-c", "xfce4-desktop", "-p", "/backdrop/screen0/monitor0/image-path", "-s", "{path}"],
        )
        .then(
            "xfconf-query",
            &["-c", "xfce4-desktop", "-p", "/backdrop/screen0/monitor0/image-style", "-s", "3"],
        )
        .then("xfdesktop", &["--reload"]),
        "lxde" => CommandSetter::new(
            "pcmanfm",
            "pcmanfm",
            &["--set-wallpaper", "{path}", "--wallpaper-mode=scaled"],
        ),
        "kde" => CommandSetter::new("plasma", "plasma-apply-wallpaperimage", &["{path}"]),
        _ => return None,
    };
    Some(setter)
}

/// The desktop's own mechanism first, then GNOME settings for unknown
/// sessions, then the generic X11 tools.
fn linux_setters(desktop_env: &str) -> Vec<Box<dyn BackgroundSetter>> {
    let native = desktop_setter(desktop_env).unwrap_or_else(gnome_setter);

    vec![
        Box::new(native),
        Box::new(CommandSetter::new("feh", "feh", &["--bg-scale", "{path}"])),
        Box::new(CommandSetter::new("nitrogen", "nitrogen", &["--set-scaled", "{path}"])),
    ]
}

/// The setter chain for the running platform.
pub fn platform_default() -> ChainSetter {
    let mut setters: Vec<Box<dyn BackgroundSetter>> = vec![Box::new(WallpaperCrateSetter)];

    if cfg!(target_os = "linux") {
        let desktop_env = get_desktop_environment();
        debug!("Detected desktop environment: {}", desktop_env);
        setters.extend(linux_setters(&desktop_env));
    } else if cfg!(target_os = "macos") {
        setters.push(Box::new(
            CommandSetter::new(
                "osascript",
                "osascript",
                &[
                    "-e",
                    "tell application \"Finder\" to set desktop picture to POSIX file (system attribute \"WALLCYCLE_WALLPAPER\")",
                ],
            )
            .with_path_env(PATH_ENV),
        ));
    } else if cfg!(target_os = "windows") {
        setters.push(Box::new(
            CommandSetter::new(
                "powershell",
                "powershell",
                &[
                    "-NoProfile",
                    "-Command",
                    "Add-Type -TypeDefinition 'using System; using System.Runtime.InteropServices; \
                     public class Wallpaper { [DllImport(\"user32.dll\", CharSet=CharSet.Auto)] \
                     public static extern int SystemParametersInfo(int uAction, int uParam, string lpvParam, int fuWinIni); }'; \
                     [Wallpaper]::SystemParametersInfo(20, 0, $env:WALLCYCLE_WALLPAPER, 3)",
                ],
            )
            .with_path_env(PATH_ENV),
        ));
    } else {
        warn!("No native wallpaper command known for this platform");
    }

    ChainSetter::new(setters)
}
