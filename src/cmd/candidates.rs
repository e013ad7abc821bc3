use std::path::Path;

use anyhow::Result;

use flux::{FluxConfig, HttpClient, SourceId};

use super::media_for;
use crate::Target;

pub async fn cmd_candidates(config_path: &Path, target: &Target, sticky: Option<&str>) -> Result<()> {
    let config = FluxConfig::load_from(config_path)?;
    let http = HttpClient::new()?;
    let aggregator = config.aggregator(http.inner());
    let policy = config.aggregation_policy(sticky.map(SourceId::from));
    let (media, identity) = media_for(target);

    eprintln!("🔎 Querying {} addons for: {} ({identity})", aggregator.sources().len(), media.title);
    let candidates = aggregator.resolve(&identity, &media.title, &policy).await;

    if target.json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    if candidates.is_empty() {
        eprintln!("❌ No streams found");
        return Ok(());
    }

    for (i, c) in candidates.iter().enumerate() {
        println!("{:>3}. [{:<5}] {:<12} {}", i + 1, c.quality.label(), c.source, c.title);
        println!("     {}", c.url);
    }
    eprintln!("\n({} candidates)", candidates.len());

    Ok(())
}
