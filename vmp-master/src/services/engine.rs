//! Audio engine invocation
//!
//! All audio work happens in an external ffmpeg process. The [`AudioEngine`]
//! trait is the only seam through which the pipeline touches it, so tests can
//! substitute a scripted double and the rest of the pipeline never spawns a
//! process.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Result of one engine invocation.
///
/// Spawn failures and timeouts are folded into `success = false` with a
/// diagnostic in `stderr`; callers decide whether a failed invocation is
/// fatal (processing passes) or degradable (measurement passes).
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Process exited with status 0 within the timeout
    pub success: bool,
    /// Captured diagnostic stream (measurements and error text)
    pub stderr: String,
}

/// Seam to the external audio engine.
#[async_trait::async_trait]
pub trait AudioEngine: Send + Sync {
    /// Run the engine with the given argument list, enforcing a timeout.
    async fn run(&self, args: &[String], timeout: Duration) -> EngineOutput;
}

/// Real engine backed by an ffmpeg binary.
pub struct FfmpegEngine {
    binary: PathBuf,
}

impl FfmpegEngine {
    /// Locate a working ffmpeg binary.
    ///
    /// Search order: explicit configured path, a sibling of the current
    /// executable, then `ffmpeg` on PATH. Each candidate is probed with
    /// `-version`; the first one that runs wins.
    pub fn locate(configured: Option<&Path>) -> vmp_common::Result<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(p) = configured {
            candidates.push(p.to_path_buf());
        }
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join(binary_name()));
            }
        }
        candidates.push(PathBuf::from(binary_name()));

        for candidate in candidates {
            if probe_version(&candidate) {
                debug!(binary = %candidate.display(), "audio engine located");
                return Ok(Self { binary: candidate });
            }
        }

        Err(vmp_common::Error::NotFound(
            "no working ffmpeg binary (configure [engine].binary or add ffmpeg to PATH)"
                .to_string(),
        ))
    }

    /// Build an engine around a known binary path without probing.
    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

fn binary_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

fn probe_version(candidate: &Path) -> bool {
    std::process::Command::new(candidate)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl AudioEngine for FfmpegEngine {
    async fn run(&self, args: &[String], timeout: Duration) -> EngineOutput {
        debug!(binary = %self.binary.display(), args = ?args, "engine invocation");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "engine spawn failed");
                return EngineOutput {
                    success: false,
                    stderr: format!("spawn failed: {}", e),
                };
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "engine invocation timed out");
                return EngineOutput {
                    success: false,
                    stderr: format!("timed out after {}s", timeout.as_secs()),
                };
            }
        };

        EngineOutput {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}
