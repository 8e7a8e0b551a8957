use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::config::PollPolicy;

/// Snapshot of a remote long-running operation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    pub handle: String,
    pub done: bool,
    pub response: Option<Value>,
    pub error: Option<String>,
}

impl GenerationJob {
    /// Parses the `{name, done, response, error}` operation envelope.
    pub fn from_operation(payload: &Value) -> Result<Self> {
        let handle = payload
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow::anyhow!("operation payload missing name: {payload}"))?
            .to_string();
        let error = payload.get("error").map(|error| {
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string())
        });
        Ok(Self {
            handle,
            done: payload.get("done").and_then(Value::as_bool).unwrap_or(false),
            response: payload.get("response").cloned(),
            error,
        })
    }
}

/// Remote side of a long-running job: one submission, then status reads by
/// handle.
pub trait LongRunningOperations {
    fn submit(&self, payload: &Value) -> Result<GenerationJob>;
    fn get(&self, handle: &str) -> Result<GenerationJob>;
}

#[derive(Debug, thiserror::Error)]
pub enum PollInterrupt {
    #[error("operation {handle} cancelled after {attempts} polls")]
    Cancelled { handle: String, attempts: u32 },
    #[error("operation {handle} still running after {:.0}s ({attempts} polls)", .waited.as_secs_f64())]
    TimedOut {
        handle: String,
        waited: Duration,
        attempts: u32,
    },
}

/// Re-polls `job.handle` until the operation reports `done`.
///
/// Each iteration waits `policy.interval` first. The wait wakes early when
/// `cancel` fires. A failed poll aborts the loop; there is no retry.
pub fn await_operation(
    ops: &dyn LongRunningOperations,
    job: GenerationJob,
    policy: &PollPolicy,
    cancel: &CancelToken,
    observer: &mut dyn FnMut(&GenerationJob, u32),
) -> Result<GenerationJob> {
    let handle = job.handle.clone();
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut current = job;

    while !current.done {
        if let Some(max_attempts) = policy.max_attempts {
            if attempts >= max_attempts {
                return Err(timed_out(&handle, started, attempts));
            }
        }
        if let Some(max_wait) = policy.max_wait {
            if started.elapsed() >= max_wait {
                return Err(timed_out(&handle, started, attempts));
            }
        }
        if !cancel.sleep(policy.interval) {
            return Err(PollInterrupt::Cancelled {
                handle: handle.clone(),
                attempts,
            }
            .into());
        }
        current = ops
            .get(&handle)
            .with_context(|| format!("poll {} failed for operation {handle}", attempts + 1))?;
        attempts += 1;
        observer(&current, attempts);
    }

    Ok(current)
}

fn timed_out(handle: &str, started: Instant, attempts: u32) -> anyhow::Error {
    PollInterrupt::TimedOut {
        handle: handle.to_string(),
        waited: started.elapsed(),
        attempts,
    }
    .into()
}
