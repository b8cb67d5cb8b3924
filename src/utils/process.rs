//! Helpers for the external tools we shell out to (ffmpeg, ffplay, say, espeak)

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// Resolve a program on PATH, or accept it as-is if it is already a path to a file
pub fn find_program(program: &str) -> Option<PathBuf> {
    match which::which(program) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::debug!("{} not found on PATH: {}", program, e);
            None
        }
    }
}

/// Spawn a detached helper process and reap it on a background thread.
///
/// The caller never waits for playback to finish.
pub fn spawn_detached(program: &PathBuf, args: &[String]) -> std::io::Result<()> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    reap(child, program.display().to_string());
    Ok(())
}

fn reap(mut child: Child, label: String) {
    let spawned = std::thread::Builder::new()
        .name("helper-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                tracing::warn!("{} exited with status {}", label, status);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to wait for {}: {}", label, e),
        });

    if let Err(e) = spawned {
        tracing::warn!("Failed to spawn reaper thread: {}", e);
    }
}
