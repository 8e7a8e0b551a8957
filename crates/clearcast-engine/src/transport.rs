use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

pub fn build_http_client(request_timeout: Duration) -> Result<HttpClient> {
    HttpClient::builder()
        .timeout(request_timeout)
        .build()
        .context("failed building HTTP client")
}

/// Reads a JSON body, turning non-2xx statuses into errors that quote the
/// service's own message so callers can match on it.
pub(crate) fn response_json_or_error(service: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("{service} response body read failed"))?;
    if !status.is_success() {
        let message = api_error_message(&body).unwrap_or_else(|| truncate_text(&body, 512));
        bail!("{service} request failed ({code}): {message}");
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{service} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// Google APIs wrap errors as `{"error": {"code", "message", "status"}}`.
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let error = parsed.get("error")?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    match error.get("status").and_then(Value::as_str) {
        Some(status) if !status.is_empty() => Some(format!("{message} [{status}]")),
        _ => Some(message.to_string()),
    }
}

pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().map(|existing| existing == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::{api_error_message, error_chain_text, truncate_text};

    #[test]
    fn api_error_message_reads_google_error_envelope() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert_eq!(
            api_error_message(body).as_deref(),
            Some("Requested entity was not found. [NOT_FOUND]")
        );
        assert!(api_error_message("<html>oops</html>").is_none());
        assert!(api_error_message(r#"{"error":{"message":""}}"#).is_none());
    }

    #[test]
    fn error_chain_text_preserves_nested_contexts() {
        let err = anyhow::anyhow!("socket closed")
            .context("Veo poll request failed (operations/abc)")
            .context("video generation failed");
        let rendered = error_chain_text(&err, 400);
        assert!(rendered.contains("video generation failed"));
        assert!(rendered.contains("Veo poll request failed"));
        assert!(rendered.contains("socket closed"));
    }

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("abc", 5), "abc");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
