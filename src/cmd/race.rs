use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use flux::{HttpClient, RaceCoordinator};

pub async fn cmd_race(endpoint: &str, urls: &[String], timeout_secs: u64) -> Result<()> {
    let endpoint = Url::parse(endpoint).context("invalid racing endpoint")?;
    let candidates = urls
        .iter()
        .map(|u| Url::parse(u).with_context(|| format!("invalid URL: {u}")))
        .collect::<Result<Vec<_>>>()?;

    let racer = RaceCoordinator::new(HttpClient::new()?.inner().clone());

    eprintln!("🏁 Racing {} URLs via {endpoint}", candidates.len());
    let winner = racer
        .try_race(&endpoint, &candidates, Duration::from_secs(timeout_secs))
        .await?;

    eprintln!("🏆 {}ms", winner.latency_ms);
    println!("{}", winner.url);

    Ok(())
}
