use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use flux::{FluxConfig, MemoryHistory, NullPlayer, PlaybackOrchestrator, ResolutionOrigin};

use super::media_for;
use crate::Target;

pub async fn cmd_resolve(config_path: &Path, target: &Target) -> Result<()> {
    let config = FluxConfig::load_from(config_path)?;
    let orchestrator =
        PlaybackOrchestrator::new(config, Arc::new(NullPlayer), Arc::new(MemoryHistory::new()))?;
    let (media, identity) = media_for(target);

    eprintln!("🔎 Resolving: {} ({identity})", media.title);
    let start = Instant::now();
    let stream = orchestrator.resolve(&media, identity).await?;
    let elapsed = start.elapsed();

    if target.json {
        println!("{}", serde_json::to_string_pretty(&stream)?);
        return Ok(());
    }

    let origin = match stream.origin {
        ResolutionOrigin::SessionCache => "session cache".to_string(),
        ResolutionOrigin::Revalidated => "revalidated session".to_string(),
        ResolutionOrigin::Raced { latency_ms } => format!("race winner, {latency_ms}ms"),
        ResolutionOrigin::TopRanked => "top ranked".to_string(),
        ResolutionOrigin::Manual => "manual".to_string(),
    };

    if let Some(candidate) = &stream.candidate {
        eprintln!("🎬 {} [{}] via {}", candidate.title, candidate.quality, candidate.source);
    }
    eprintln!("⏱️  {:.0}ms ({origin})", elapsed.as_secs_f64() * 1000.0);
    println!("{}", stream.url);

    Ok(())
}
