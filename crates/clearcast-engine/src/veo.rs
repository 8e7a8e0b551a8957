use anyhow::{bail, Context, Result};
use clearcast_contracts::assets::{AspectRatio, Asset};
use clearcast_contracts::events::EventWriter;
use clearcast_contracts::keys::ApiKey;
use reqwest::blocking::Client as HttpClient;
use reqwest::Url;
use serde_json::{json, Value};

use crate::cancel::CancelToken;
use crate::config::{GenerationConfig, PollPolicy};
use crate::emit_event as emit;
use crate::gemini::endpoint_for_model;
use crate::operations::{await_operation, GenerationJob, LongRunningOperations};
use crate::transport::{build_http_client, response_json_or_error};

/// Standing guidance appended to every video prompt.
pub const VIDEO_PROMPT_SUFFIX: &str = "Do not include any watermarks, logos, text overlays, \
captions, subtitles or on-screen text. Maximize visual quality: sharp detail, clean footage, \
natural lighting.";

const VIDEO_MIME_TYPE: &str = "video/mp4";

/// Long-running text-to-video generation.
pub trait VideoGenerator: Send + Sync {
    /// Blocks until the remote job finishes, fails or `cancel` fires.
    /// `Ok(None)` means the job finished without a retrievable video.
    fn generate_video(
        &self,
        key: &ApiKey,
        prompt: &str,
        aspect_ratio: AspectRatio,
        cancel: &CancelToken,
    ) -> Result<Option<Asset>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub resolution: String,
}

impl VideoRequest {
    pub fn payload(&self) -> Value {
        json!({
            "instances": [{ "prompt": augment_prompt(&self.prompt) }],
            "parameters": {
                "aspectRatio": self.aspect_ratio.as_str(),
                "resolution": self.resolution,
                "sampleCount": 1,
            },
        })
    }
}

pub struct VeoVideoGenerator {
    api_base: String,
    model: String,
    resolution: String,
    poll: PollPolicy,
    http: HttpClient,
    events: Option<EventWriter>,
}

impl VeoVideoGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            api_base: config.api_base.clone(),
            model: config.video_model.clone(),
            resolution: config.video_resolution.clone(),
            poll: config.poll.clone(),
            http: build_http_client(config.request_timeout)?,
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl VideoGenerator for VeoVideoGenerator {
    fn generate_video(
        &self,
        key: &ApiKey,
        prompt: &str,
        aspect_ratio: AspectRatio,
        cancel: &CancelToken,
    ) -> Result<Option<Asset>> {
        let ops = VeoOperations {
            http: &self.http,
            api_base: &self.api_base,
            model: &self.model,
            key,
        };
        let request = VideoRequest {
            prompt: prompt.to_string(),
            aspect_ratio,
            resolution: self.resolution.clone(),
        };
        run_video_job(&ops, &request, key, &self.poll, cancel, self.events.as_ref())
    }
}

struct VeoOperations<'a> {
    http: &'a HttpClient,
    api_base: &'a str,
    model: &'a str,
    key: &'a ApiKey,
}

impl LongRunningOperations for VeoOperations<'_> {
    fn submit(&self, payload: &Value) -> Result<GenerationJob> {
        let endpoint = endpoint_for_model(self.api_base, self.model, "predictLongRunning");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.key.expose())])
            .json(payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Veo submit request failed ({endpoint})"))?;
        let operation = response_json_or_error("Veo submit", response)?;
        GenerationJob::from_operation(&operation)
    }

    fn get(&self, handle: &str) -> Result<GenerationJob> {
        let endpoint = format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            handle.trim_start_matches('/')
        );
        let response = self
            .http
            .get(&endpoint)
            .query(&[("key", self.key.expose())])
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Veo poll request failed ({endpoint})"))?;
        let operation = response_json_or_error("Veo poll", response)?;
        GenerationJob::from_operation(&operation)
    }
}

/// Submits one video job, waits for it and resolves the first generated
/// video into a credentialed remote asset.
pub fn run_video_job(
    ops: &dyn LongRunningOperations,
    request: &VideoRequest,
    key: &ApiKey,
    poll: &PollPolicy,
    cancel: &CancelToken,
    events: Option<&EventWriter>,
) -> Result<Option<Asset>> {
    let submitted = ops.submit(&request.payload())?;
    emit(
        events,
        "video_job_submitted",
        json!({
            "operation": submitted.handle,
            "aspect_ratio": request.aspect_ratio.as_str(),
            "resolution": request.resolution,
            "done": submitted.done,
        }),
    );

    let finished = await_operation(ops, submitted, poll, cancel, &mut |job, attempt| {
        emit(
            events,
            "video_job_polled",
            json!({
                "operation": job.handle,
                "attempt": attempt,
                "done": job.done,
            }),
        );
    })?;

    if let Some(message) = finished.error.as_deref() {
        bail!("Veo operation {} failed: {message}", finished.handle);
    }
    let response = finished.response.unwrap_or(Value::Null);
    let filtered = rai_filter_reasons(&response);
    if !filtered.is_empty() {
        emit(
            events,
            "video_job_filtered",
            json!({ "operation": finished.handle, "reasons": filtered }),
        );
    }

    let Some(uri) = first_video_uri(&response) else {
        return Ok(None);
    };
    let credentialed = append_key(&uri, key);
    Ok(Some(Asset::remote(VIDEO_MIME_TYPE, credentialed)))
}

pub fn augment_prompt(prompt: &str) -> String {
    let base = prompt.trim().trim_end_matches(['.', ' ']);
    if base.is_empty() {
        return VIDEO_PROMPT_SUFFIX.to_string();
    }
    format!("{base}. {VIDEO_PROMPT_SUFFIX}")
}

/// Retrieval URI of the first generated video, if the job produced one.
pub(crate) fn first_video_uri(response: &Value) -> Option<String> {
    let first = response
        .pointer("/generateVideoResponse/generatedSamples/0")
        .or_else(|| response.pointer("/generatedVideos/0"))?;
    first
        .pointer("/video/uri")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn rai_filter_reasons(response: &Value) -> Vec<String> {
    response
        .pointer("/generateVideoResponse/raiMediaFilteredReasons")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Adds the credential as the `key` query parameter.
pub fn append_key(uri: &str, key: &ApiKey) -> String {
    match Url::parse(uri) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("key", key.expose());
            url.to_string()
        }
        Err(_) => {
            let separator = if uri.contains('?') { '&' } else { '?' };
            format!("{uri}{separator}key={}", key.expose())
        }
    }
}
