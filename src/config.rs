use url::Url;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Runtime settings, read once at startup. Problems are collected as
/// warnings and a usable default is kept, so the server always starts.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: Url,
    pub max_body_bytes: usize,
    warnings: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut warnings = Vec::new();

        let api_key = get("GEMINI_API_KEY");
        if api_key.is_none() {
            warnings.push(
                "GEMINI_API_KEY is not set; every analysis will return the fallback result"
                    .to_string(),
            );
        }

        let api_base = match get("GEMINI_API_BASE") {
            None => default_api_base(),
            Some(raw) => match Url::parse(&raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => url,
                _ => {
                    warnings.push(format!(
                        "GEMINI_API_BASE {raw:?} is not an http(s) URL; using {DEFAULT_API_BASE}"
                    ));
                    default_api_base()
                }
            },
        };

        let max_body_bytes = match get("MAX_BODY_BYTES") {
            None => DEFAULT_MAX_BODY_BYTES,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warnings.push(format!(
                        "MAX_BODY_BYTES {raw:?} is not a positive integer; using {DEFAULT_MAX_BODY_BYTES}"
                    ));
                    DEFAULT_MAX_BODY_BYTES
                }
            },
        };

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            api_key,
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base,
            max_body_bytes,
            warnings,
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

fn default_api_base() -> Url {
    Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL")
}
