// SPDX-License-Identifier: MIT
//! Capture data model types.

use serde::{Deserialize, Serialize};

/// Configuration for one headless screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Screenshot timeout in seconds.
    pub timeout_secs: u64,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

/// A captured page image, PNG-encoded.
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// The URL that was rendered.
    pub url: String,
    /// Raw PNG bytes. Ephemeral — never written to durable state.
    pub png: Vec<u8>,
    /// Viewport used for the capture.
    pub width: u32,
    pub height: u32,
    /// RFC 3339 capture timestamp.
    pub captured_at: String,
}

/// Why a screenshot could not be produced.
///
/// Restricted pages, missing browsers, and sandbox denials all land here —
/// the pipeline reports them as capture-stage failures and waits for the
/// next tick.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(
        "no headless browser found on PATH (looked for chromium, chrome, \
         google-chrome, chromium-browser)"
    )]
    NoBrowser,
    #[error("failed to start browser process: {0}")]
    SpawnFailed(String),
    #[error("browser did not produce output within {0} seconds")]
    Timeout(u64),
    #[error("browser exited but produced no screenshot file")]
    NoOutput,
    #[error("could not read browser output: {0}")]
    ReadFailed(String),
}
