//! Message content classification.
//!
//! Message content is either typed text or a URL returned by the upload
//! endpoint. The variant is decided once when a message enters the view.

use std::fmt;

const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "gif", "png", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov"];
const FALLBACK_FILE_NAME: &str = "Download File";

/// Classified message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Image { url: String },
    Video { url: String },
    File { url: String, name: String },
}

/// URL prefix under which the backend serves uploaded files.
pub fn uploads_prefix(backend_url: &str) -> String {
    format!("{}/uploads/", backend_url.trim_end_matches('/'))
}

impl Content {
    /// Classify raw content. Only URLs under `uploads_prefix` are treated as
    /// attachments; everything else is text, even if it looks like a link.
    pub fn classify(content: &str, uploads_prefix: &str) -> Self {
        if !content.starts_with(uploads_prefix) {
            return Content::Text(content.to_string());
        }

        let segment = last_path_segment(content);
        let url = content.to_string();
        match extension(segment).as_deref() {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => Content::Image { url },
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => Content::Video { url },
            _ => Content::File {
                url,
                name: display_file_name(segment),
            },
        }
    }

    /// Short tag shown before attachments.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Content::Text(_) => None,
            Content::Image { .. } => Some("[image]"),
            Content::Video { .. } => Some("[video]"),
            Content::File { .. } => Some("[file]"),
        }
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Text(text) => f.write_str(text),
            Content::Image { url } => write!(f, "[image] {}", url),
            Content::Video { url } => write!(f, "[video] {}", url),
            Content::File { url, name } => write!(f, "[file] {} <{}>", name, url),
        }
    }
}

/// Last path segment of a URL, with query and fragment removed.
fn last_path_segment(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let path = &raw[..end];
    path.rsplit('/').next().unwrap_or(path)
}

fn extension(segment: &str) -> Option<String> {
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Uploads are stored as `<timestamp>-<nonce>-<original name>`; show the original name.
fn display_file_name(segment: &str) -> String {
    let name = segment.splitn(3, '-').nth(2).unwrap_or("");
    if name.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}
