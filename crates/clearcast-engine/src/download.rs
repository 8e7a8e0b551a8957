use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clearcast_contracts::assets::{Asset, AssetPayload, Mode};
use reqwest::blocking::Client as HttpClient;

use crate::transport::truncate_text;

/// `clearcast-<mode>-<millis>.<ext>`
pub fn download_name(mode: Mode, timestamp_millis: i64, asset: &Asset) -> String {
    format!("clearcast-{}-{timestamp_millis}.{}", mode.as_str(), asset.extension())
}

/// Writes `asset` to `dir/name`. Remote assets are fetched first; their URI
/// already carries the credential, so it is never echoed in errors.
pub fn save_asset(http: &HttpClient, asset: &Asset, dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
    let path = dir.join(name);
    match asset.payload() {
        AssetPayload::Inline(bytes) => {
            fs::write(&path, &bytes[..])
                .with_context(|| format!("failed writing {}", path.display()))?;
        }
        AssetPayload::Remote(uri) => {
            let bytes = fetch_remote(http, uri)?;
            fs::write(&path, bytes).with_context(|| format!("failed writing {}", path.display()))?;
        }
    }
    Ok(path)
}

fn fetch_remote(http: &HttpClient, uri: &str) -> Result<Vec<u8>> {
    let shown = without_query(uri);
    let response = http
        .get(uri)
        .send()
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("failed downloading asset ({shown})"))?;
    if !response.status().is_success() {
        let code = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        bail!(
            "asset download failed ({code}) for {shown}: {}",
            truncate_text(&body, 512)
        );
    }
    Ok(response
        .bytes()
        .map_err(reqwest::Error::without_url)
        .context("failed reading asset bytes")?
        .to_vec())
}

fn without_query(uri: &str) -> &str {
    uri.split_once('?').map(|(head, _)| head).unwrap_or(uri)
}
