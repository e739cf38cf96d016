use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use mcpchat::extraction::ExtractedImage;

/// Decode an extracted image and write it under `dir`, returning the file written
pub fn save_screenshot(dir: &Path, image: &ExtractedImage) -> Result<PathBuf> {
    let bytes = decode(&image.data)?;

    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let path = dir.join(screenshot_file_name(Utc::now(), image.mime_type.as_deref()));
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), "saved screenshot");
    Ok(path)
}

fn decode(data: &str) -> Result<Vec<u8>> {
    // tolerate a data url prefix and wrapped lines
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("image data is not valid base64")
}

pub fn screenshot_file_name(at: DateTime<Utc>, mime_type: Option<&str>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("screenshot-{}.{}", stamp, extension_for(mime_type))
}

fn extension_for(mime_type: Option<&str>) -> &'static str {
    match mime_type.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "jpg",
    }
}
