use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use flux::{HttpClient, LivenessProbe};

pub async fn cmd_probe(url: &str, timeout_secs: u64) -> Result<()> {
    let url = Url::parse(url).context("invalid URL")?;
    let probe = LivenessProbe::new(HttpClient::new()?.inner().clone());

    if probe.is_alive(&url, Duration::from_secs(timeout_secs)).await {
        println!("✅ alive: {url}");
        Ok(())
    } else {
        anyhow::bail!("stream is not served: {url}")
    }
}
