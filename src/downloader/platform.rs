// Platform detection by host substring

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of platforms the dispatcher knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    YouTube,
    Facebook,
    TikTok,
    Unknown,
}

/// Ordered domain table. The first platform with a matching domain wins.
const PLATFORM_DOMAINS: &[(PlatformId, &[&str])] = &[
    (PlatformId::YouTube, &["youtube.com", "youtu.be", "m.youtube.com"]),
    (
        PlatformId::Facebook,
        &["facebook.com", "fb.com", "fb.watch", "m.facebook.com"],
    ),
    (PlatformId::TikTok, &["tiktok.com", "vm.tiktok.com", "m.tiktok.com"]),
];

impl PlatformId {
    /// Lowercase identifier, as accepted in platform hints
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Facebook => "facebook",
            Self::TikTok => "tiktok",
            Self::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::Facebook => "Facebook",
            Self::TikTok => "TikTok",
            Self::Unknown => "Unknown",
        }
    }

    pub fn domains(&self) -> &'static [&'static str] {
        PLATFORM_DOMAINS
            .iter()
            .find(|(platform, _)| platform == self)
            .map(|(_, domains)| *domains)
            .unwrap_or(&[])
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned for hint strings that name no known platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlatformName(pub String);

impl FromStr for PlatformId {
    type Err = UnknownPlatformName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" => Ok(Self::YouTube),
            "facebook" => Ok(Self::Facebook),
            "tiktok" => Ok(Self::TikTok),
            "unknown" => Ok(Self::Unknown),
            other => Err(UnknownPlatformName(other.to_string())),
        }
    }
}

/// Classify a URL into a platform. Total and pure.
pub fn detect(url: &str) -> PlatformId {
    let lower = url.to_lowercase();

    PLATFORM_DOMAINS
        .iter()
        .find(|(_, domains)| domains.iter().any(|domain| lower.contains(domain)))
        .map_or(PlatformId::Unknown, |(platform, _)| *platform)
}

pub fn is_youtube_short(url: &str) -> bool {
    url.to_lowercase().contains("/shorts/")
}
