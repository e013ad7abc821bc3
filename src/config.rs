//! Configuration loaded from `~/.config/flux/config.toml`.
//!
//! Every field has a default, so a missing file or a partial one both work.
//!
//! ```toml
//! preferred_source = "WebStreamer"
//! quality_ceiling = "1080p"
//!
//! [[addons]]
//! name = "WebStreamer"
//! base_url = "https://webstreamr.hayd.uk"
//!
//! [racing]
//! endpoint = "https://racer.example.workers.dev"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::stream::{
    AddonClient, AggregationPolicy, CandidateAggregator, CandidateSource, QualityTier,
    RankingPolicy, SourceId,
};

/// One addon instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonConfig {
    pub name: SourceId,
    pub base_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Remote racing worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RacingConfig {
    pub enabled: bool,
    /// Worker URL; racing is skipped when unset.
    pub endpoint: Option<Url>,
    pub timeout_secs: u64,
    /// Candidates raced from each of the top two sources.
    pub per_source: usize,
}

impl Default for RacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            timeout_secs: 5,
            per_source: 5,
        }
    }
}

impl RacingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Endpoint to race against, when racing is on.
    pub fn active_endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref().filter(|_| self.enabled)
    }
}

/// Network timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub addon_secs: u64,
    pub probe_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            addon_secs: 8,
            probe_secs: 3,
        }
    }
}

impl TimeoutConfig {
    pub fn addon(&self) -> Duration {
        Duration::from_secs(self.addon_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }
}

/// Playback session tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Age after which a remembered URL is probed before reuse.
    pub freshness_minutes: u64,
    /// Delay before refreshing candidates after an instant resume.
    pub refresh_delay_secs: u64,
    /// Progress fraction that triggers next-episode preloading.
    pub preload_threshold: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            freshness_minutes: 60,
            refresh_delay_secs: 3,
            preload_threshold: 0.9,
        }
    }
}

impl PlaybackConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_minutes * 60)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_delay_secs)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
    /// Source ranked first after the sticky one.
    pub preferred_source: Option<SourceId>,
    /// Highest quality tier to prefer.
    pub quality_ceiling: QualityTier,
    pub addons: Vec<AddonConfig>,
    pub racing: RacingConfig,
    pub timeouts: TimeoutConfig,
    pub playback: PlaybackConfig,
}

impl Default for FluxConfig {
    fn default() -> Self {
        Self {
            preferred_source: Some(SourceId::from("WebStreamer")),
            quality_ceiling: QualityTier::Uhd,
            addons: vec![
                AddonConfig {
                    name: SourceId::from("WebStreamer"),
                    base_url: "https://webstreamr.hayd.uk".to_string(),
                    enabled: true,
                },
                AddonConfig {
                    name: SourceId::from("Nuvio"),
                    base_url: "https://nuviostreams.hayd.uk".to_string(),
                    enabled: true,
                },
            ],
            racing: RacingConfig::default(),
            timeouts: TimeoutConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl FluxConfig {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Aggregation settings for one resolution.
    pub fn aggregation_policy(&self, sticky_source: Option<SourceId>) -> AggregationPolicy {
        AggregationPolicy {
            ranking: RankingPolicy {
                sticky_source,
                preferred_source: self.preferred_source.clone(),
                quality_ceiling: self.quality_ceiling,
            },
            disabled: self
                .addons
                .iter()
                .filter(|a| !a.enabled)
                .map(|a| a.name.clone())
                .collect::<HashSet<_>>(),
        }
    }

    /// One [`AddonClient`] per configured addon, enabled or not.
    pub fn addon_clients(&self, client: &reqwest::Client) -> Vec<Arc<dyn CandidateSource>> {
        self.addons
            .iter()
            .map(|a| {
                Arc::new(
                    AddonClient::new(a.name.clone(), a.base_url.clone(), client.clone())
                        .with_timeout(self.timeouts.addon()),
                ) as Arc<dyn CandidateSource>
            })
            .collect()
    }

    /// Aggregator over all configured addons.
    pub fn aggregator(&self, client: &reqwest::Client) -> CandidateAggregator {
        CandidateAggregator::new(self.addon_clients(client))
    }
}

/// Choices made during playback that outlive the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// Source of the last manually selected stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky_source: Option<SourceId>,
}

impl UserState {
    /// Load from `path`; a missing file is an empty state.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Write to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Path to the default config file.
pub fn config_path() -> PathBuf {
    flux_dir().join("config.toml")
}

/// Path to the persisted [`UserState`], next to the config file.
pub fn state_path() -> PathBuf {
    flux_dir().join("state.toml")
}

fn flux_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flux")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = FluxConfig::parse("").unwrap();
        assert_eq!(config, FluxConfig::default());
        assert_eq!(config.addons.len(), 2);
        assert_eq!(config.playback.freshness(), Duration::from_secs(3600));
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r#"
quality_ceiling = "1080p"

[[addons]]
name = "Local"
base_url = "http://127.0.0.1:7000"

[[addons]]
name = "Backup"
base_url = "http://127.0.0.1:7001"
enabled = false

[racing]
endpoint = "https://racer.example.dev/"
per_source = 3
"#;
        let config = FluxConfig::parse(toml_str).unwrap();
        assert_eq!(config.quality_ceiling, QualityTier::P1080);
        assert_eq!(config.addons.len(), 2);
        assert!(config.addons[0].enabled);
        assert!(!config.addons[1].enabled);
        assert_eq!(config.racing.per_source, 3);
        assert_eq!(config.racing.timeout(), Duration::from_secs(5));
        assert!(config.racing.active_endpoint().is_some());
        assert_eq!(config.timeouts.addon(), Duration::from_secs(8));
    }

    #[test]
    fn disabled_addons_feed_the_policy() {
        let mut config = FluxConfig::default();
        config.addons[1].enabled = false;
        let policy = config.aggregation_policy(Some(SourceId::from("Nuvio")));
        assert!(policy.disabled.contains(&SourceId::from("Nuvio")));
        assert_eq!(policy.ranking.sticky_source, Some(SourceId::from("Nuvio")));
        assert_eq!(policy.ranking.preferred_source, Some(SourceId::from("WebStreamer")));
    }

    #[test]
    fn racing_disabled_hides_endpoint() {
        let racing = RacingConfig {
            enabled: false,
            endpoint: Some(Url::parse("https://racer.example.dev").unwrap()),
            ..Default::default()
        };
        assert!(racing.active_endpoint().is_none());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = FluxConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(FluxConfig::parse(&text).unwrap(), config);
    }

    #[test]
    fn invalid_quality_is_rejected() {
        assert!(FluxConfig::parse("quality_ceiling = \"8K\"").is_err());
    }

    #[test]
    fn user_state_survives_a_reload() {
        let dir = std::env::temp_dir().join(format!("flux_state_{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("state.toml");

        assert_eq!(UserState::load_from(&path).unwrap(), UserState::default());

        let state = UserState {
            sticky_source: Some(SourceId::from("Nuvio")),
        };
        state.save_to(&path).unwrap();
        assert_eq!(UserState::load_from(&path).unwrap(), state);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn corrupt_user_state_is_an_error() {
        let dir = std::env::temp_dir().join(format!("flux_state_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.toml");
        std::fs::write(&path, "sticky_source = [").unwrap();

        assert!(UserState::load_from(&path).is_err());

        std::fs::remove_dir_all(dir).unwrap();
    }
}
