//! Finding an inline image in what a query produced.
//!
//! Tools such as browser automation servers hand back screenshots as a json fragment
//! `{"type":"image","data":"<base64>"}` embedded in their text output, and models sometimes
//! echo that fragment into their reply. Extraction is best effort: the first match wins,
//! tool results are searched before the reply text, and a strict parse is tried before
//! falling back to pattern matching.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref DATA_FIELD: Regex = Regex::new(r#""data"\s*:\s*"([^"]+)""#).unwrap();
    static ref IMAGE_FRAGMENT: Regex =
        Regex::new(r#"\{?\s*"type"\s*:\s*"image"\s*,\s*"data"\s*:\s*"([^"]+)"\s*\}?"#).unwrap();
    static ref LONG_DATA_FIELD: Regex =
        Regex::new(r#""data"\s*:\s*"([A-Za-z0-9+/=]{100,})""#).unwrap();
}

/// Where an image was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    /// The tool result at this position in emission order
    ToolResult { index: usize },
    /// The model's own reply text
    ResponseText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// Base64 payload, still encoded
    pub data: String,
    pub mime_type: Option<String>,
    pub origin: ImageOrigin,
}

/// The image found, if any, and the text to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub image: Option<ExtractedImage>,
    pub display_text: String,
}

pub fn extract_image(tool_results: &[String], text: &str) -> Extraction {
    for (index, result) in tool_results.iter().enumerate() {
        if let Some((data, mime_type)) = image_in_tool_result(result) {
            return Extraction {
                image: Some(ExtractedImage {
                    data,
                    mime_type,
                    origin: ImageOrigin::ToolResult { index },
                }),
                display_text: text.to_string(),
            };
        }
    }

    match image_in_text(text) {
        Some((data, mime_type, span)) => {
            let mut display_text = String::with_capacity(text.len());
            display_text.push_str(&text[..span.0]);
            display_text.push_str(&text[span.1..]);
            Extraction {
                image: Some(ExtractedImage {
                    data,
                    mime_type,
                    origin: ImageOrigin::ResponseText,
                }),
                display_text: display_text.trim().to_string(),
            }
        }
        None => Extraction {
            image: None,
            display_text: text.to_string(),
        },
    }
}

fn as_image(value: &Value) -> Option<(String, Option<String>)> {
    if value.get("type").and_then(Value::as_str) != Some("image") {
        return None;
    }
    let data = value.get("data").and_then(Value::as_str)?;
    let mime_type = value
        .get("mimeType")
        .or_else(|| value.get("mime_type"))
        .and_then(Value::as_str)
        .map(String::from);
    Some((data.to_string(), mime_type))
}

fn image_in_tool_result(result: &str) -> Option<(String, Option<String>)> {
    if let Ok(value) = serde_json::from_str::<Value>(result) {
        return as_image(&value);
    }

    // mixed results are flattened one fragment per line
    result
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .find_map(|value| as_image(&value))
        .or_else(|| {
            DATA_FIELD
                .captures(result)
                .map(|caps| (caps[1].to_string(), None))
        })
}

/// Returns the image and the byte span of the text it was found in
fn image_in_text(text: &str) -> Option<(String, Option<String>, (usize, usize))> {
    for (start, _) in text.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = values.next() {
            if let Some((data, mime_type)) = as_image(&value) {
                return Some((data, mime_type, (start, start + values.byte_offset())));
            }
        }
    }

    [&*IMAGE_FRAGMENT, &*LONG_DATA_FIELD]
        .iter()
        .find_map(|pattern| pattern.captures(text))
        .and_then(|caps| {
            let whole = caps.get(0)?;
            Some((caps[1].to_string(), None, (whole.start(), whole.end())))
        })
}
