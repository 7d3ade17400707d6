//! Streaming file downloads

use super::StageError;
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// GET `url` and stream the body into `output`, replacing any existing file.
///
/// One attempt only. A non-2xx status fails before the file is touched; a
/// transfer that breaks halfway leaves whatever was written so far.
pub(crate) async fn download_file(
    client: &reqwest::Client,
    url: &str,
    output: &Path,
) -> Result<u64, StageError> {
    debug!(url = %url, output = %output.display(), "Downloading");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| StageError::Http {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(StageError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let content_length = response.content_length();
    let mut file = fs::File::create(output)
        .await
        .map_err(|e| StageError::io("creating", output, e))?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_report = Instant::now();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| StageError::Http {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| StageError::io("writing", output, e))?;
        downloaded += chunk.len() as u64;

        if last_report.elapsed() > PROGRESS_INTERVAL {
            let pct = content_length.map(|t| (downloaded * 100) / t.max(1)).unwrap_or(0);
            info!(url = %url, downloaded = downloaded, percent = pct, "Download progress");
            last_report = Instant::now();
        }
    }

    file.sync_all()
        .await
        .map_err(|e| StageError::io("syncing", output, e))?;
    info!(url = %url, bytes = downloaded, "Download complete");
    Ok(downloaded)
}
