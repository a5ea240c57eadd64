//! Open the served URL in the default browser.

use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

/// Launch the platform opener for `url` without waiting for it.
pub fn open(url: &str) -> Result<()> {
    let mut command = opener_command(url)?;
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to open browser for {url}"))?;
    Ok(())
}

fn opener_command(url: &str) -> Result<Command> {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        return Ok(command);
    }

    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        return Ok(command);
    }

    for candidate in ["xdg-open", "sensible-browser"] {
        if let Ok(program) = which::which(candidate) {
            let mut command = Command::new(program);
            command.arg(url);
            return Ok(command);
        }
    }
    bail!("no browser opener found (tried xdg-open, sensible-browser)")
}
