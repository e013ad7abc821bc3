//! Candidate streams and their inferred quality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Name of a configured addon source (e.g. `"WebStreamer"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Resolution tier, ordered from lowest to highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum QualityTier {
    #[default]
    #[serde(rename = "SD", alias = "sd")]
    Sd,
    #[serde(rename = "480p", alias = "480P")]
    P480,
    #[serde(rename = "720p", alias = "720P")]
    P720,
    #[serde(rename = "1080p", alias = "1080P")]
    P1080,
    #[serde(rename = "4K", alias = "4k", alias = "2160p", alias = "UHD", alias = "uhd")]
    Uhd,
}

/// Resolution tokens checked in priority order.
const QUALITY_TOKENS: &[(&str, QualityTier)] = &[
    ("2160p", QualityTier::Uhd),
    ("4k", QualityTier::Uhd),
    ("1080p", QualityTier::P1080),
    ("720p", QualityTier::P720),
    ("480p", QualityTier::P480),
];

impl QualityTier {
    /// Infer the tier from free text by case-insensitive token search.
    pub fn from_title(title: &str) -> Self {
        let lower = title.to_lowercase();
        QUALITY_TOKENS
            .iter()
            .find(|(token, _)| lower.contains(token))
            .map_or(Self::Sd, |(_, tier)| *tier)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sd => "SD",
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::Uhd => "4K",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sd" => Ok(Self::Sd),
            "480p" => Ok(Self::P480),
            "720p" => Ok(Self::P720),
            "1080p" => Ok(Self::P1080),
            "4k" | "2160p" | "uhd" => Ok(Self::Uhd),
            other => Err(format!("unknown quality '{other}' (expected SD, 480p, 720p, 1080p or 4K)")),
        }
    }
}

/// One playable URL discovered from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub url: Url,
    pub source: SourceId,
    pub quality: QualityTier,
}

impl Candidate {
    /// Build a candidate, inferring quality from the title.
    pub fn new(title: impl Into<String>, url: Url, source: SourceId) -> Self {
        let title = title.into();
        let quality = QualityTier::from_title(&title);
        Self {
            title,
            url,
            source,
            quality,
        }
    }
}
