// Requested quality, as supplied by the caller

use std::fmt;

use serde::{Deserialize, Serialize};

/// Serialised as its canonical key, so `Height(720)` becomes `"720"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum QualitySpec {
    /// Highest available, converted to mp4 when possible
    Best,
    /// Highest available, container left as the source provides it
    Original,
    /// Audio only, extracted to mp3 when possible
    Audio,
    /// Cap on vertical resolution
    Height(u32),
}

impl QualitySpec {
    /// Parse a caller string. Never fails: anything unrecognised means `Best`.
    ///
    /// Accepts `"720"` as well as the `"720p"` spelling some front-ends send.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim().to_lowercase();
        match trimmed.as_str() {
            "best" | "" => Self::Best,
            "original" => Self::Original,
            "audio" => Self::Audio,
            other => {
                let digits = other.strip_suffix('p').unwrap_or(other);
                match digits.parse::<u32>() {
                    Ok(height) if height > 0 => Self::Height(height),
                    _ => {
                        tracing::debug!(quality = value, "Unrecognised quality, using best");
                        Self::Best
                    }
                }
            }
        }
    }

    /// Canonical string used as part of the cache key
    pub fn key(&self) -> String {
        match self {
            Self::Best => "best".to_string(),
            Self::Original => "original".to_string(),
            Self::Audio => "audio".to_string(),
            Self::Height(height) => height.to_string(),
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

impl Default for QualitySpec {
    fn default() -> Self {
        Self::Best
    }
}

impl fmt::Display for QualitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<&str> for QualitySpec {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for QualitySpec {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<QualitySpec> for String {
    fn from(quality: QualitySpec) -> Self {
        quality.key()
    }
}
