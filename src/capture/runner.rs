// SPDX-License-Identifier: MIT
//! Headless browser screenshot runner.
//!
//! Strategy:
//!   1. `detect_browser()` searches PATH for a supported browser binary.
//!   2. `capture()` spawns it with `--headless --screenshot
//!      --window-size=WxH` pointed at the URL; the browser writes
//!      `screenshot.png` into a scratch directory.
//!   3. The PNG is read back and handed to the pipeline as raw bytes.
//!
//! If no browser is installed, `capture()` fails immediately without
//! spawning anything.

use chrono::Utc;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::model::{CaptureConfig, CaptureError, Screenshot};

/// Browser binaries to probe, in preference order.
const CANDIDATE_BROWSERS: &[&str] = &["chromium", "chrome", "google-chrome", "chromium-browser"];

/// Detect the first headless-capable browser binary on PATH.
pub fn detect_browser() -> Option<String> {
    CANDIDATE_BROWSERS.iter().find_map(|candidate| {
        on_path(candidate).then(|| {
            debug!(browser = *candidate, "headless browser detected on PATH");
            (*candidate).to_string()
        })
    })
}

/// Render `url` in a headless browser and return the screenshot PNG.
pub async fn capture(url: &str, config: &CaptureConfig) -> Result<Screenshot, CaptureError> {
    let browser = detect_browser().ok_or(CaptureError::NoBrowser)?;

    // The browser writes screenshot.png into its working directory; isolate
    // each run in a scratch dir so concurrent captures can't collide.
    let scratch = TempDir::new().map_err(|e| CaptureError::SpawnFailed(e.to_string()))?;
    let output_path = scratch.path().join("screenshot.png");

    let mut cmd = Command::new(&browser);
    cmd.arg("--headless")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--screenshot")
        .arg(output_path.to_string_lossy().as_ref())
        .arg(format!(
            "--window-size={},{}",
            config.viewport_width, config.viewport_height
        ))
        .arg(url)
        .current_dir(scratch.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    debug!(%browser, %url, "spawning headless browser");

    let mut child = cmd
        .spawn()
        .map_err(|e| CaptureError::SpawnFailed(e.to_string()))?;

    match timeout(Duration::from_secs(config.timeout_secs), child.wait()).await {
        Err(_elapsed) => {
            // Kill the child so a hung page doesn't leave a zombie behind.
            let _ = child.kill().await;
            warn!(%url, secs = config.timeout_secs, "screenshot timed out");
            return Err(CaptureError::Timeout(config.timeout_secs));
        }
        Ok(Err(e)) => return Err(CaptureError::SpawnFailed(e.to_string())),
        Ok(Ok(status)) => {
            if !status.success() {
                // Restricted pages often exit non-zero but still write a
                // (blank or partial) file; fall through and check.
                warn!(%url, ?status, "browser exited with non-zero status");
            }
        }
    }

    if !output_path.exists() {
        return Err(CaptureError::NoOutput);
    }

    let png = tokio::fs::read(&output_path)
        .await
        .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;
    if png.is_empty() {
        return Err(CaptureError::NoOutput);
    }

    Ok(Screenshot {
        url: url.to_string(),
        png,
        width: config.viewport_width,
        height: config.viewport_height,
        captured_at: Utc::now().to_rfc3339(),
    })
}

/// `which` semantics without shelling out: stat each PATH entry.
fn on_path(binary: &str) -> bool {
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    path_var
        .split(':')
        .any(|dir| Path::new(dir).join(binary).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_path_finds_nothing_for_garbage_binary() {
        assert!(!on_path("definitely-not-a-real-browser-binary"));
    }
}
