//! Content identities and the catalog metadata they are built from.
//!
//! The catalog itself lives outside this crate. Callers hand over a
//! [`MediaInfo`] with the canonical title and season layout, and everything
//! downstream keys off the resulting [`ContentIdentity`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a title is a single movie or an episodic series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    /// Path segment used by addon stream endpoints.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one watchable unit: a movie, or one episode of a series.
///
/// Equality requires the external ID, season and episode to all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentIdentity {
    external_id: String,
    season: Option<u32>,
    episode: Option<u32>,
}

impl ContentIdentity {
    pub fn movie(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            season: None,
            episode: None,
        }
    }

    pub fn episode(external_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            external_id: external_id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    /// Series identity where a missing season or episode means the first one.
    pub fn series(external_id: impl Into<String>, season: Option<u32>, episode: Option<u32>) -> Self {
        Self::episode(external_id, season.unwrap_or(1), episode.unwrap_or(1))
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn season(&self) -> Option<u32> {
        self.season
    }

    pub fn episode_number(&self) -> Option<u32> {
        self.episode
    }

    pub fn kind(&self) -> MediaKind {
        if self.season.is_some() {
            MediaKind::Series
        } else {
            MediaKind::Movie
        }
    }

    /// Addon stream ID: `<id>` for movies, `<id>:<season>:<episode>` for episodes.
    pub fn stream_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => write!(f, "{}:{s}:{e}", self.external_id),
            _ => f.write_str(&self.external_id),
        }
    }
}

/// Season layout as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonInfo {
    pub number: u32,
    pub episode_count: u32,
}

/// Catalog metadata for a title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub external_id: String,
    /// Canonical title, used to filter out mismatched streams.
    pub title: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub seasons: Vec<SeasonInfo>,
}

impl MediaInfo {
    pub fn movie(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            kind: MediaKind::Movie,
            seasons: Vec::new(),
        }
    }

    pub fn series(
        external_id: impl Into<String>,
        title: impl Into<String>,
        seasons: Vec<SeasonInfo>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            kind: MediaKind::Series,
            seasons,
        }
    }

    /// Build the identity for this title.
    ///
    /// A title is treated as a series when the catalog says so or when the
    /// caller asks for a season; missing numbers default to 1.
    pub fn identity(&self, season: Option<u32>, episode: Option<u32>) -> ContentIdentity {
        if self.kind == MediaKind::Series || season.is_some() {
            ContentIdentity::series(self.external_id.clone(), season, episode)
        } else {
            ContentIdentity::movie(self.external_id.clone())
        }
    }

    /// The episode that follows `current`, if the catalog knows one.
    ///
    /// Advances within the season while episodes remain, then moves to
    /// episode 1 of the next season when that season exists.
    pub fn next_episode(&self, current: &ContentIdentity) -> Option<ContentIdentity> {
        let season = current.season()?;
        let episode = current.episode_number()?;

        if let Some(info) = self.seasons.iter().find(|s| s.number == season) {
            if episode < info.episode_count {
                return Some(ContentIdentity::episode(
                    current.external_id(),
                    season,
                    episode + 1,
                ));
            }
        }

        let next_season = season + 1;
        self.seasons
            .iter()
            .any(|s| s.number == next_season)
            .then(|| ContentIdentity::episode(current.external_id(), next_season, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show() -> MediaInfo {
        MediaInfo::series(
            "tt0903747",
            "Breaking Bad",
            vec![
                SeasonInfo { number: 1, episode_count: 7 },
                SeasonInfo { number: 2, episode_count: 13 },
            ],
        )
    }

    #[test]
    fn series_defaults_to_first_episode() {
        let id = show().identity(None, None);
        assert_eq!(id, ContentIdentity::episode("tt0903747", 1, 1));
        assert_eq!(id.stream_id(), "tt0903747:1:1");
        assert_eq!(id.kind(), MediaKind::Series);
    }

    #[test]
    fn movie_ignores_missing_episode_numbers() {
        let id = MediaInfo::movie("tt0133093", "The Matrix").identity(None, None);
        assert_eq!(id.stream_id(), "tt0133093");
        assert_eq!(id.kind(), MediaKind::Movie);
    }

    #[test]
    fn explicit_season_makes_a_series_identity() {
        let id = MediaInfo::movie("tt1", "Anything").identity(Some(2), None);
        assert_eq!(id, ContentIdentity::episode("tt1", 2, 1));
    }

    #[test]
    fn identity_equality_requires_all_fields() {
        assert_ne!(
            ContentIdentity::episode("tt1", 1, 2),
            ContentIdentity::episode("tt1", 2, 1)
        );
        assert_ne!(ContentIdentity::movie("tt1"), ContentIdentity::episode("tt1", 1, 1));
    }

    #[test]
    fn next_episode_within_season() {
        let next = show().next_episode(&ContentIdentity::episode("tt0903747", 1, 3));
        assert_eq!(next, Some(ContentIdentity::episode("tt0903747", 1, 4)));
    }

    #[test]
    fn next_episode_rolls_into_next_season() {
        let next = show().next_episode(&ContentIdentity::episode("tt0903747", 1, 7));
        assert_eq!(next, Some(ContentIdentity::episode("tt0903747", 2, 1)));
    }

    #[test]
    fn no_next_episode_after_finale() {
        assert_eq!(
            show().next_episode(&ContentIdentity::episode("tt0903747", 2, 13)),
            None
        );
        assert_eq!(show().next_episode(&ContentIdentity::movie("tt0903747")), None);
    }
}
