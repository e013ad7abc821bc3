pub mod candidates;
pub mod config;
pub mod probe;
pub mod race;
pub mod resolve;

use flux::{ContentIdentity, MediaInfo};

use crate::Target;

/// Catalog entry and identity for a CLI target.
fn media_for(target: &Target) -> (MediaInfo, ContentIdentity) {
    let media = if target.season.is_some() || target.episode.is_some() {
        MediaInfo::series(&target.id, &target.title, Vec::new())
    } else {
        MediaInfo::movie(&target.id, &target.title)
    };
    let identity = media.identity(target.season, target.episode);
    (media, identity)
}
