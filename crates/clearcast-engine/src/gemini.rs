use anyhow::{bail, Context, Result};
use clearcast_contracts::assets::Asset;
use clearcast_contracts::keys::ApiKey;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::config::GenerationConfig;
use crate::transport::{build_http_client, response_json_or_error};

/// Single round-trip image edit.
pub trait ImageEditor: Send + Sync {
    /// Returns `Ok(None)` when the call succeeded but carried no image.
    fn edit_image(&self, key: &ApiKey, asset: &Asset, instruction: &str) -> Result<Option<Asset>>;
}

pub struct GeminiImageEditor {
    api_base: String,
    model: String,
    http: HttpClient,
}

impl GeminiImageEditor {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            api_base: config.api_base.clone(),
            model: config.image_model.clone(),
            http: build_http_client(config.request_timeout)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        endpoint_for_model(&self.api_base, &self.model, "generateContent")
    }
}

impl ImageEditor for GeminiImageEditor {
    fn edit_image(&self, key: &ApiKey, asset: &Asset, instruction: &str) -> Result<Option<Asset>> {
        let endpoint = self.endpoint();
        let payload = build_edit_payload(asset, instruction)?;
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", key.expose())])
            .json(&payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        first_inline_asset(&response_payload)
    }
}

pub(crate) fn endpoint_for_model(api_base: &str, model: &str, method: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{}/{}:{}", api_base.trim_end_matches('/'), model_path, method)
}

/// One user turn: the image as inline data, then the instruction text.
pub(crate) fn build_edit_payload(asset: &Asset, instruction: &str) -> Result<Value> {
    let Some(data) = asset.base64_payload() else {
        bail!("image edit needs an inline image payload, got a remote reference");
    };
    Ok(json!({
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inlineData": {
                        "mimeType": asset.mime_type(),
                        "data": data,
                    }
                },
                { "text": instruction },
            ],
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"],
        },
    }))
}

/// Scans every candidate's parts and returns the first inline binary part.
pub(crate) fn first_inline_asset(response_payload: &Value) -> Result<Option<Asset>> {
    let candidates = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for part in parts {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            let asset = Asset::from_base64(mime_type, data)
                .context("Gemini image base64 decode failed")?;
            return Ok(Some(asset));
        }
    }

    Ok(None)
}
