use clearcast_contracts::assets::Mode;

use crate::operations::PollInterrupt;
use crate::transport::error_chain_text;

pub const API_KEY_MESSAGE: &str = "API key error: the selected key is missing or was rejected. \
Please select a valid API key from a paid Google Cloud project and try again.";

/// Substrings the generation service uses when a credential is missing,
/// invalid or points at a project without access.
pub const AUTH_FAILURE_MARKERS: &[&str] = &[
    "Requested entity was not found",
    "API key not valid",
    "API_KEY_INVALID",
];

/// Everything the session can show in its error field. `Display` is the
/// user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Please select a valid {expected} file (got {found}).")]
    WrongFileType { expected: Mode, found: String },
    #[error("Could not read the selected file: {0}")]
    ReadError(String),
    #[error("{}", empty_result_message(.0))]
    EmptyResult(Mode),
    #[error("{0}")]
    RemoteFault(String),
    #[error("{}", API_KEY_MESSAGE)]
    AuthRequired,
    #[error("Video generation is still running after {waited_secs}s; stopped waiting.")]
    JobTimedOut { waited_secs: u64 },
    #[error("Processing was cancelled.")]
    Cancelled,
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::WrongFileType { .. } => "wrong_file_type",
            SessionError::ReadError(_) => "read_error",
            SessionError::EmptyResult(_) => "empty_result",
            SessionError::RemoteFault(_) => "remote_fault",
            SessionError::AuthRequired => "auth_required",
            SessionError::JobTimedOut { .. } => "job_timed_out",
            SessionError::Cancelled => "cancelled",
        }
    }
}

fn empty_result_message(mode: &Mode) -> &'static str {
    match mode {
        Mode::Image => "Processing failed: the model did not return an edited image. Try a different instruction.",
        Mode::Video => "Video generation failed: no video was returned. Try adjusting the prompt.",
    }
}

pub fn is_auth_failure(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    AUTH_FAILURE_MARKERS
        .iter()
        .any(|marker| lowered.contains(&marker.to_ascii_lowercase()))
}

/// Maps a fault raised by the generation client onto the session taxonomy.
pub fn classify_fault(err: &anyhow::Error) -> SessionError {
    if let Some(interrupt) = err.downcast_ref::<PollInterrupt>() {
        return match interrupt {
            PollInterrupt::Cancelled { .. } => SessionError::Cancelled,
            PollInterrupt::TimedOut { waited, .. } => SessionError::JobTimedOut {
                waited_secs: waited.as_secs(),
            },
        };
    }
    let text = error_chain_text(err, 600);
    if is_auth_failure(&text) {
        return SessionError::AuthRequired;
    }
    SessionError::RemoteFault(text)
}
