//! Screenshot captioning pipeline.
//!
//! Sequential, single-flight per invocation: capture → downscale → caption →
//! sanitize → composite → save. Each stage's failure aborts the run with a
//! stage-tagged error and no partial [`MemeRecord`] is emitted.

pub mod compose;

use chrono::Utc;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::capture::{self, CaptureConfig, CaptureError};
use crate::caption;
use crate::captioner::{CaptionClient, CaptionerError};

/// Screenshots wider than this are downscaled before the API call; the
/// composite always uses the original.
pub const DOWNSCALE_MAX_WIDTH: u32 = 896;

// ─── Record ───────────────────────────────────────────────────────────────────

/// One finished captioned screenshot.
///
/// The durable copy excludes the image payload — only the newest record is
/// kept and storage stays bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemeRecord {
    pub id: String,
    /// Where the PNG was written; `None` when auto-save is off.
    pub path: Option<PathBuf>,
    pub source_host: String,
    pub original_url: String,
    pub caption_text: String,
    pub created_at: String,
    /// Composited PNG bytes. Ephemeral — never serialized.
    #[serde(skip)]
    pub image_png: Vec<u8>,
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Pipeline failure, tagged with the stage that aborted the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("capture stage: {0}")]
    Capture(#[from] CaptureError),
    #[error("image stage: {0}")]
    Image(#[from] image::ImageError),
    #[error("caption stage: {0}")]
    Caption(#[from] CaptionerError),
    #[error("save stage: {0}")]
    Save(#[from] std::io::Error),
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────

/// Everything one pipeline run needs from the configuration snapshot.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub capture: CaptureConfig,
    pub api_key: String,
    pub auto_save: bool,
    /// Resolved output directory (`{data_dir}/{output_folder}`).
    pub output_dir: PathBuf,
}

/// Run the full pipeline for `tab_url`.
pub async fn run(
    captioner: &CaptionClient,
    tab_url: &str,
    settings: &PipelineSettings,
) -> Result<MemeRecord, PipelineError> {
    // 1. Capture the page.
    let shot = capture::capture(tab_url, &settings.capture).await?;

    // 2. Decode, and downscale a copy for the model — the API only needs
    //    legibility, and smaller payloads upload faster.
    let original = image::load_from_memory(&shot.png)?;
    let api_png = encode_png(&downscale(&original))?;

    // 3–4. Caption and sanitize. Sanitize is total; whatever the model says
    //       becomes a usable caption.
    let raw = captioner.caption_png(&settings.api_key, &api_png).await?;
    let caption_text = caption::sanitize(&raw);

    // 5. Composite onto the original-resolution screenshot.
    let mut composited = original.to_rgba8();
    compose::draw_caption_banner(&mut composited, &caption_text);
    let image_png = encode_png(&DynamicImage::ImageRgba8(composited))?;

    // 6. Persist the PNG when auto-save is on.
    let path = if settings.auto_save {
        let filename = format!("meme-{}.png", Utc::now().format("%Y%m%d-%H%M%S"));
        let path = settings.output_dir.join(filename);
        tokio::fs::create_dir_all(&settings.output_dir).await?;
        tokio::fs::write(&path, &image_png).await?;
        Some(path)
    } else {
        None
    };

    let record = MemeRecord {
        id: Uuid::new_v4().to_string(),
        path,
        source_host: host_of(tab_url),
        original_url: tab_url.to_string(),
        caption_text,
        created_at: Utc::now().to_rfc3339(),
        image_png,
    };
    info!(
        host = %record.source_host,
        caption = %record.caption_text,
        saved = record.path.is_some(),
        "captioned screenshot ready"
    );
    Ok(record)
}

fn downscale(img: &DynamicImage) -> DynamicImage {
    if img.width() > DOWNSCALE_MAX_WIDTH {
        img.resize(DOWNSCALE_MAX_WIDTH, u32::MAX, FilterType::Triangle)
    } else {
        img.clone()
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn host_of(raw_url: &str) -> String {
    Url::parse(raw_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction_handles_odd_urls() {
        assert_eq!(host_of("https://www.youtube.com/watch?v=x"), "www.youtube.com");
        assert_eq!(host_of("about:blank"), "unknown");
        assert_eq!(host_of("not a url"), "unknown");
    }

    #[test]
    fn durable_record_excludes_the_image_payload() {
        let record = MemeRecord {
            id: "id".into(),
            path: None,
            source_host: "example.com".into(),
            original_url: "https://example.com".into(),
            caption_text: "caption".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            image_png: vec![1, 2, 3],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("image_png"));
        assert!(json.contains("caption"));
    }

    #[test]
    fn downscale_preserves_aspect_and_bounds_width() {
        let img = DynamicImage::new_rgba8(1792, 1008);
        let small = downscale(&img);
        assert_eq!(small.width(), DOWNSCALE_MAX_WIDTH);
        assert_eq!(small.height(), 504);

        let tiny = DynamicImage::new_rgba8(640, 480);
        assert_eq!(downscale(&tiny).width(), 640);
    }

    #[test]
    fn encode_round_trips_through_png() {
        let img = DynamicImage::new_rgba8(16, 8);
        let png = encode_png(&img).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (16, 8));
    }
}
