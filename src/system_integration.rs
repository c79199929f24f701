use anyhow::{anyhow, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::job_engine::types::PowerAction;

/// Machine power control. The core never builds shell strings, it only calls these.
pub trait PowerControl: Send + Sync {
    fn reboot_now(&self) -> Result<()>;
    fn shutdown_now(&self) -> Result<()>;
}

/// Dispatches a [`PowerAction`] to the matching [`PowerControl`] operation.
pub fn run_power_action(power: &dyn PowerControl, action: PowerAction) -> Result<()> {
    match action {
        PowerAction::Reboot => power.reboot_now(),
        PowerAction::Shutdown => power.shutdown_now(),
    }
}

/// Best-effort desktop notification.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str, timeout_secs: u32) -> Result<()>;
}

/// Uses the operating system's own shutdown tooling.
pub struct SystemPower;

impl SystemPower {
    fn power_command(action: PowerAction) -> (&'static str, Vec<&'static str>) {
        if cfg!(windows) {
            match action {
                PowerAction::Reboot => ("shutdown", vec!["/r", "/t", "0"]),
                PowerAction::Shutdown => ("shutdown", vec!["/s", "/t", "0"]),
            }
        } else if cfg!(target_os = "macos") {
            match action {
                PowerAction::Reboot => ("shutdown", vec!["-r", "now"]),
                PowerAction::Shutdown => ("shutdown", vec!["-h", "now"]),
            }
        } else {
            match action {
                PowerAction::Reboot => ("systemctl", vec!["reboot"]),
                PowerAction::Shutdown => ("systemctl", vec!["poweroff"]),
            }
        }
    }

    fn invoke(action: PowerAction) -> Result<()> {
        let (program, args) = Self::power_command(action);
        tracing::warn!(%action, program, ?args, "Invoking power action");

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| anyhow!("{program} execution failed: {e}"))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(anyhow!(
            "{program} exited with {}: {}",
            output.status,
            if stderr.is_empty() { "no output" } else { &stderr }
        ))
    }
}

impl PowerControl for SystemPower {
    fn reboot_now(&self) -> Result<()> {
        Self::invoke(PowerAction::Reboot)
    }

    fn shutdown_now(&self) -> Result<()> {
        Self::invoke(PowerAction::Shutdown)
    }
}

/// Desktop notifications through the platform's command line helpers
/// (`notify-send`, `osascript`, PowerShell balloon tip).
pub struct DesktopNotifier {
    app_name: String,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("RoboClone")
    }
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Escapes a value for a double-quoted AppleScript / single-quoted PowerShell literal.
    fn quote(value: &str, quote: char) -> String {
        match quote {
            '"' => value.replace('\\', "\\\\").replace('"', "\\\""),
            _ => value.replace('\'', "''"),
        }
    }

    fn build_command(&self, title: &str, body: &str, timeout_secs: u32) -> Command {
        if cfg!(windows) {
            let script = format!(
                "Add-Type -AssemblyName System.Windows.Forms; \
                 $n = New-Object System.Windows.Forms.NotifyIcon; \
                 $n.Icon = [System.Drawing.SystemIcons]::Information; \
                 $n.Text = '{app}'; $n.Visible = $true; \
                 $n.ShowBalloonTip({ms}, '{title}', '{body}', 'Info'); \
                 Start-Sleep -Seconds {secs}; $n.Dispose()",
                app = Self::quote(&self.app_name, '\''),
                ms = timeout_secs * 1000,
                title = Self::quote(title, '\''),
                body = Self::quote(body, '\''),
                secs = timeout_secs,
            );
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
            cmd
        } else if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\" subtitle \"{}\"",
                Self::quote(body, '"'),
                Self::quote(&self.app_name, '"'),
                Self::quote(title, '"'),
            );
            let mut cmd = Command::new("osascript");
            cmd.args(["-e", &script]);
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name")
                .arg(&self.app_name)
                .arg("--expire-time")
                .arg((timeout_secs * 1000).to_string())
                .arg(title)
                .arg(body);
            cmd
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str, timeout_secs: u32) -> Result<()> {
        // Spawned and left running: the balloon helper on Windows sleeps for the timeout.
        self.build_command(title, body, timeout_secs)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| anyhow!("notification helper failed to start: {e}"))?;
        Ok(())
    }
}

/// Returns the closest ancestor of `path` (itself included) that exists.
pub fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors().find(|p| p.exists()).map(Path::to_path_buf)
}

/// Bytes available to the current user on the volume backing `path`.
#[cfg(unix)]
pub fn get_available_space(path: &Path) -> io::Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(io::Error::from)?;
    Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
}

/// Bytes available to the current user on the volume backing `path`.
#[cfg(windows)]
pub fn get_available_space(path: &Path) -> io::Result<u64> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let mut available: u64 = 0;

    // SAFETY: `wide` is NUL-terminated and outlives the call; null out-params are allowed.
    let ok = unsafe {
        GetDiskFreeSpaceExW(
            wide.as_ptr(),
            &mut available,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(available)
}

#[cfg(not(any(unix, windows)))]
pub fn get_available_space(_path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "free space query not supported on this platform",
    ))
}
