use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";
pub const DEFAULT_TITLE_LENGTH: usize = 60;
pub const DEFAULT_DESCRIPTION_LENGTH: usize = 300;
pub const DEFAULT_TAGS_LENGTH: usize = 150;

static IMAGE_MIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^image/[a-z0-9.+-]+$").unwrap());

static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^data:([^;,]*)(?:;[^,]*)?,").unwrap());

// ── Request ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image: Option<String>,
    pub mime_type: Option<String>,
    pub title_length: Option<i64>,
    pub description_length: Option<i64>,
    pub tags_length: Option<i64>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("No image provided")]
    MissingImage,
    #[error("{field} must be a positive integer")]
    InvalidLimit { field: &'static str },
}

/// Character budgets for the three output fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub title: usize,
    pub description: usize,
    pub tags: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE_LENGTH,
            description: DEFAULT_DESCRIPTION_LENGTH,
            tags: DEFAULT_TAGS_LENGTH,
        }
    }
}

/// The image as it is forwarded to the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub data: String,
    pub mime_type: String,
}

impl AnalyzeRequest {
    pub fn limits(&self) -> Result<Limits, RequestError> {
        Ok(Limits {
            title: positive(self.title_length, "titleLength", DEFAULT_TITLE_LENGTH)?,
            description: positive(
                self.description_length,
                "descriptionLength",
                DEFAULT_DESCRIPTION_LENGTH,
            )?,
            tags: positive(self.tags_length, "tagsLength", DEFAULT_TAGS_LENGTH)?,
        })
    }

    /// Pull the base64 payload out of the request, unwrapping a data URL if
    /// the client sent one.
    pub fn image_input(&self) -> Result<ImageInput, RequestError> {
        let raw = self
            .image
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RequestError::MissingImage)?;

        let (data, embedded_mime) = match DATA_URL_RE.captures(raw) {
            Some(caps) => {
                let prefix_len = caps.get(0).map(|m| m.end()).unwrap_or(0);
                let mime = caps.get(1).map(|m| m.as_str()).filter(|m| !m.is_empty());
                (&raw[prefix_len..], mime)
            }
            None => (raw, None),
        };

        if data.trim().is_empty() {
            return Err(RequestError::MissingImage);
        }

        // An unusable explicit type defers to the one embedded in a data URL.
        let requested = self
            .mime_type
            .as_deref()
            .map(str::trim)
            .filter(|mime| IMAGE_MIME_RE.is_match(mime))
            .or(embedded_mime);
        Ok(ImageInput {
            data: data.to_string(),
            mime_type: resolve_mime_type(requested),
        })
    }
}

fn positive(value: Option<i64>, field: &'static str, default: usize) -> Result<usize, RequestError> {
    match value {
        None => Ok(default),
        Some(v) if v > 0 => usize::try_from(v).map_err(|_| RequestError::InvalidLimit { field }),
        Some(_) => Err(RequestError::InvalidLimit { field }),
    }
}

/// Anything that doesn't look like `image/<subtype>` is replaced, never rejected.
pub fn resolve_mime_type(requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(mime) if IMAGE_MIME_RE.is_match(mime) => mime.to_ascii_lowercase(),
        _ => DEFAULT_MIME_TYPE.to_string(),
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub error: String,
}
