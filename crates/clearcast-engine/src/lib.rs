pub mod cancel;
pub mod config;
pub mod download;
pub mod errors;
pub mod gemini;
pub mod keys;
pub mod operations;
pub mod session;
pub mod transport;
pub mod veo;

use clearcast_contracts::events::{payload, EventWriter};
use serde_json::Value;

pub use cancel::CancelToken;
pub use config::{GenerationConfig, PollPolicy};
pub use errors::SessionError;
pub use gemini::{GeminiImageEditor, ImageEditor};
pub use keys::SelectableKeyProvider;
pub use session::{Completion, Dispatch, Session, SessionState};
pub use veo::{VeoVideoGenerator, VideoGenerator};

/// Diagnostics are best effort: a failed write is reported on stderr and the
/// caller carries on.
pub(crate) fn emit_event(events: Option<&EventWriter>, event_type: &str, value: Value) {
    let Some(events) = events else {
        return;
    };
    if let Err(err) = events.emit(event_type, payload(value)) {
        eprintln!("clearcast: failed writing {event_type} event: {err:#}");
    }
}
