//! Open a generated diagram in the platform's default browser.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

/// Launch the default browser on `path` without waiting for it.
///
/// - **Linux**: `xdg-open`
/// - **macOS**: `open`
/// - **Windows**: `cmd /C start`
///
/// # Errors
///
/// Returns an error if the path cannot be resolved, the launcher cannot be
/// spawned, or the platform has no known launcher.
pub fn open_in_browser(path: &Path) -> Result<()> {
    let absolute = std::fs::canonicalize(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    let target = absolute.to_string_lossy().into_owned();

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]).arg(&target);
        command
    };

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut command = Command::new("open");
        command.arg(&target);
        command
    };

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let mut command = {
        let mut command = Command::new("xdg-open");
        command.arg(&target);
        command
    };

    command
        .spawn()
        .with_context(|| format!("failed to launch a browser for {target}"))?;
    Ok(())
}
