//! Error taxonomy for stream resolution.
//!
//! Only [`FluxError::NoCandidates`] and [`FluxError::AllCandidatesExhausted`]
//! are meant to reach a user. Source, decode and race failures are absorbed
//! by the component that hits them and logged.

use thiserror::Error;

use crate::media::ContentIdentity;
use crate::stream::SourceId;

/// Stream resolution errors
#[derive(Error, Debug)]
pub enum FluxError {
    #[error("addon {addon} unavailable: {reason}")]
    SourceUnavailable { addon: SourceId, reason: String },

    #[error("addon {addon} returned an undecodable response: {reason}")]
    Decode { addon: SourceId, reason: String },

    #[error("race endpoint unavailable: {0}")]
    RaceUnavailable(String),

    #[error("no streams available for {0}")]
    NoCandidates(ContentIdentity),

    #[error("unable to play {0}: every candidate stream failed")]
    AllCandidatesExhausted(ContentIdentity),

    #[error("no active playback session")]
    NoActiveSession,

    #[error("no stream is playing")]
    NotPlaying,

    #[error("resolution cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FluxError {
    /// Whether this error is one of the two user-visible terminal states.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::NoCandidates(_) | Self::AllCandidatesExhausted(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FluxError>;
