use std::path::Path;

use clearcast_contracts::assets::{encode_file, mime_for_path, AspectRatio, Asset, Mode};
use clearcast_contracts::events::EventWriter;
use clearcast_contracts::history::{History, HistoryEntry};
use clearcast_contracts::keys::{ApiKey, KeyProvider};
use serde_json::{json, Value};

use crate::cancel::CancelToken;
use crate::emit_event;
use crate::errors::{classify_fault, SessionError};
use crate::gemini::ImageEditor;
use crate::veo::VideoGenerator;

pub const DEFAULT_IMAGE_INSTRUCTION: &str = "Remove all watermarks, logos, stamps and overlaid \
text from this image. Keep everything else exactly as it is and fill the cleared areas so they \
blend seamlessly with the surrounding content.";

pub const DEFAULT_VIDEO_INSTRUCTION: &str = "A clean, high-quality cinematic clip of the same \
scene with no watermarks, logos or on-screen text.";

pub fn default_instruction(mode: Mode) -> &'static str {
    match mode {
        Mode::Image => DEFAULT_IMAGE_INSTRUCTION,
        Mode::Video => DEFAULT_VIDEO_INSTRUCTION,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SourceLoaded,
    Processing,
    ResultReady,
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::SourceLoaded => "source_loaded",
            SessionState::Processing => "processing",
            SessionState::ResultReady => "result_ready",
            SessionState::Failed => "failed",
        }
    }
}

/// What `complete` did with an outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Nothing was dispatched.
    Ignored,
    ResultReady,
    Failed(SessionError),
    Cancelled,
    /// The session moved on while the call was in flight.
    Stale,
}

/// One generation request, tagged with the session identity it was issued
/// under. Owned so it can run off the session's thread.
#[derive(Debug)]
pub struct Dispatch {
    epoch: u64,
    serial: u64,
    mode: Mode,
    source: Asset,
    instruction: String,
    aspect_ratio: AspectRatio,
    cancel: CancelToken,
    events: Option<EventWriter>,
}

impl Dispatch {
    /// Performs the remote call for this dispatch and classifies its outcome.
    ///
    /// Video jobs check `has_key` first and prompt once when it is false; if
    /// the prompt still leaves no key the job is not sent. An authentication
    /// fault from either call prompts for a new key exactly once.
    pub fn run(
        &self,
        editor: &dyn ImageEditor,
        generator: &dyn VideoGenerator,
        keys: &dyn KeyProvider,
    ) -> Result<Asset, SessionError> {
        let mut prompted = false;
        if self.mode == Mode::Video && !keys.has_key() {
            self.prompt(keys, "missing_key");
            prompted = true;
        }
        let Some(key) = keys.current_key() else {
            if !prompted {
                self.prompt(keys, "missing_key");
            }
            self.emit("auth_required", json!({ "reason": "no_key" }));
            return Err(SessionError::AuthRequired);
        };

        let outcome = match self.mode {
            Mode::Image => editor.edit_image(&key, &self.source, &self.instruction),
            Mode::Video => {
                generator.generate_video(&key, &self.instruction, self.aspect_ratio, &self.cancel)
            }
        };

        match outcome {
            Ok(Some(asset)) => Ok(asset),
            Ok(None) => Err(SessionError::EmptyResult(self.mode)),
            Err(err) => Err(self.fault(&err, &key, keys)),
        }
    }

    fn fault(&self, err: &anyhow::Error, key: &ApiKey, keys: &dyn KeyProvider) -> SessionError {
        let classified = classify_fault(err);
        match &classified {
            SessionError::AuthRequired => {
                self.emit(
                    "auth_required",
                    json!({ "reason": "rejected", "key": key.redacted_id(), "error": format!("{err:#}") }),
                );
                self.prompt(keys, "rejected_key");
            }
            SessionError::Cancelled => {}
            other => {
                self.emit(
                    "remote_fault",
                    json!({ "kind": other.kind(), "error": format!("{err:#}") }),
                );
            }
        }
        classified
    }

    fn prompt(&self, keys: &dyn KeyProvider, reason: &str) {
        self.emit("key_prompted", json!({ "reason": reason }));
        keys.prompt_key_selection();
    }

    fn emit(&self, event_type: &str, mut value: Value) {
        if let Value::Object(map) = &mut value {
            map.insert("epoch".to_string(), json!(self.epoch));
            map.insert("serial".to_string(), json!(self.serial));
            map.insert("mode".to_string(), json!(self.mode.as_str()));
        }
        emit_event(self.events.as_ref(), event_type, value);
    }
}

struct InFlight {
    serial: u64,
    cancel: CancelToken,
}

/// Working state for one user session: the active mode, the loaded source,
/// the latest result and the conversion history.
///
/// Every transition that replaces the source advances `epoch`; outcomes of
/// dispatches issued under an older epoch are dropped by `complete`.
pub struct Session {
    mode: Mode,
    source: Option<Asset>,
    result: Option<Asset>,
    instruction: String,
    aspect_ratio: AspectRatio,
    error: Option<SessionError>,
    history: History,
    epoch: u64,
    next_serial: u64,
    in_flight: Option<InFlight>,
    events: Option<EventWriter>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            source: None,
            result: None,
            instruction: default_instruction(mode).to_string(),
            aspect_ratio: AspectRatio::default(),
            error: None,
            history: History::new(),
            epoch: 0,
            next_serial: 0,
            in_flight: None,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn source(&self) -> Option<&Asset> {
        self.source.as_ref()
    }

    pub fn result(&self) -> Option<&Asset> {
        self.result.as_ref()
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.is_processing() {
            SessionState::Processing
        } else if self.error.is_some() {
            SessionState::Failed
        } else if self.result.is_some() {
            SessionState::ResultReady
        } else if self.source.is_some() {
            SessionState::SourceLoaded
        } else {
            SessionState::Idle
        }
    }

    pub fn select_mode(&mut self, mode: Mode) {
        self.advance_epoch();
        self.mode = mode;
        self.source = None;
        self.result = None;
        self.error = None;
        self.instruction = default_instruction(mode).to_string();
        self.emit("mode_selected", json!({ "mode": mode.as_str() }));
    }

    /// Replaces the source. A type that does not match the active mode is
    /// rejected and leaves the current source untouched.
    pub fn load_source(&mut self, asset: Asset) -> Result<(), SessionError> {
        self.check_type(asset.mime_type())?;
        self.advance_epoch();
        self.emit(
            "source_loaded",
            json!({
                "mime_type": asset.mime_type(),
                "bytes": asset.byte_len(),
                "fingerprint": asset.fingerprint(),
            }),
        );
        self.source = Some(asset);
        self.result = None;
        self.error = None;
        Ok(())
    }

    /// Checks the file's declared type against the mode before reading it.
    pub fn load_file(&mut self, path: &Path) -> Result<(), SessionError> {
        let declared = mime_for_path(path).unwrap_or("application/octet-stream");
        self.check_type(declared)?;
        match encode_file(path) {
            Ok(asset) => self.load_source(asset),
            Err(err) => {
                let error = SessionError::ReadError(err.to_string());
                self.emit(
                    "source_rejected",
                    json!({ "kind": error.kind(), "error": err.to_string() }),
                );
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    pub fn set_instruction(&mut self, instruction: impl Into<String>) {
        self.instruction = instruction.into();
    }

    pub fn reset_instruction(&mut self) {
        self.instruction = default_instruction(self.mode).to_string();
    }

    /// Only meaningful in video mode; returns whether the value changed.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) -> bool {
        if self.mode != Mode::Video || self.aspect_ratio == aspect_ratio {
            return false;
        }
        self.aspect_ratio = aspect_ratio;
        true
    }

    /// Moves into `Processing` and hands back the request to run. Returns
    /// `None` without touching anything when there is no source or a call is
    /// already outstanding.
    pub fn begin_processing(&mut self) -> Option<Dispatch> {
        if self.in_flight.is_some() {
            return None;
        }
        let source = self.source.clone()?;

        self.next_serial += 1;
        let cancel = CancelToken::new();
        self.in_flight = Some(InFlight {
            serial: self.next_serial,
            cancel: cancel.clone(),
        });
        self.error = None;

        let dispatch = Dispatch {
            epoch: self.epoch,
            serial: self.next_serial,
            mode: self.mode,
            source,
            instruction: self.instruction.clone(),
            aspect_ratio: self.aspect_ratio,
            cancel,
            events: self.events.clone(),
        };
        self.emit(
            "processing_started",
            json!({
                "serial": dispatch.serial,
                "refine": self.result.is_some(),
                "aspect_ratio": dispatch.aspect_ratio.as_str(),
                "instruction_chars": dispatch.instruction.chars().count(),
            }),
        );
        Some(dispatch)
    }

    /// Applies the outcome of `dispatch` if the session still matches it.
    pub fn complete(&mut self, dispatch: Dispatch, outcome: Result<Asset, SessionError>) -> Completion {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.serial == dispatch.serial);
        if dispatch.epoch != self.epoch || !current {
            self.emit(
                "stale_result_discarded",
                json!({
                    "dispatch_epoch": dispatch.epoch,
                    "serial": dispatch.serial,
                    "ok": outcome.is_ok(),
                }),
            );
            return Completion::Stale;
        }
        self.in_flight = None;

        match outcome {
            Ok(asset) => {
                let entry = HistoryEntry::new(dispatch.mode, dispatch.source, asset.clone());
                self.emit(
                    "result_ready",
                    json!({
                        "serial": dispatch.serial,
                        "history_id": entry.id,
                        "mime_type": asset.mime_type(),
                        "remote": asset.is_remote(),
                        "bytes": asset.byte_len(),
                    }),
                );
                self.history.record(entry);
                self.result = Some(asset);
                self.error = None;
                Completion::ResultReady
            }
            Err(SessionError::Cancelled) => Completion::Cancelled,
            Err(error) => {
                self.emit(
                    "processing_failed",
                    json!({
                        "serial": dispatch.serial,
                        "kind": error.kind(),
                        "message": error.to_string(),
                    }),
                );
                self.error = Some(error.clone());
                Completion::Failed(error)
            }
        }
    }

    /// Runs one dispatch to completion on the calling thread.
    pub fn start_processing(
        &mut self,
        editor: &dyn ImageEditor,
        generator: &dyn VideoGenerator,
        keys: &dyn KeyProvider,
    ) -> Completion {
        let Some(dispatch) = self.begin_processing() else {
            return Completion::Ignored;
        };
        let outcome = dispatch.run(editor, generator, keys);
        self.complete(dispatch, outcome)
    }

    pub fn discard(&mut self) {
        self.advance_epoch();
        self.source = None;
        self.result = None;
        self.error = None;
        self.emit("discarded", json!({ "history_len": self.history.len() }));
    }

    /// Restores entry `index` (0 = newest) as a finished result.
    pub fn select_history_entry(&mut self, index: usize) -> bool {
        let Some(entry) = self.history.get(index).cloned() else {
            return false;
        };
        self.advance_epoch();
        if entry.mode != self.mode {
            self.instruction = default_instruction(entry.mode).to_string();
        }
        self.mode = entry.mode;
        self.emit(
            "history_restored",
            json!({ "index": index, "history_id": entry.id, "mode": entry.mode.as_str() }),
        );
        self.source = Some(entry.original);
        self.result = Some(entry.edited);
        self.error = None;
        true
    }

    fn check_type(&mut self, mime_type: &str) -> Result<(), SessionError> {
        if self.mode.accepts(mime_type) {
            return Ok(());
        }
        let error = SessionError::WrongFileType {
            expected: self.mode,
            found: mime_type.to_string(),
        };
        self.emit(
            "source_rejected",
            json!({ "kind": error.kind(), "mime_type": mime_type }),
        );
        self.error = Some(error.clone());
        Err(error)
    }

    fn advance_epoch(&mut self) {
        self.epoch += 1;
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
        }
    }

    fn emit(&self, event_type: &str, mut value: Value) {
        if let Value::Object(map) = &mut value {
            map.insert("epoch".to_string(), json!(self.epoch));
            map.entry("mode".to_string())
                .or_insert_with(|| json!(self.mode.as_str()));
        }
        emit_event(self.events.as_ref(), event_type, value);
    }
}
