//! Talos image factory schematic requests

use super::StageError;
use serde::Deserialize;
use tracing::debug;

/// Customization submitted for every run: predictable interface names plus
/// the gVisor and Intel microcode extensions.
pub const SCHEMATIC: &str = "customization:
  extraKernelArgs:
    - net.ifnames=0
  systemExtensions:
    officialExtensions:
      - siderolabs/gvisor
      - siderolabs/intel-ucode";

/// Body returned by `POST /schematics`
#[derive(Debug, Clone, Deserialize)]
pub struct SchematicResponse {
    pub id: String,
}

/// Submit [`SCHEMATIC`] to the factory and return the schematic ID
pub(crate) async fn create_schematic(
    client: &reqwest::Client,
    factory_url: &str,
) -> Result<String, StageError> {
    let url = format!("{}/schematics", factory_url);
    debug!(url = %url, "Creating Talos schematic");

    let response = client
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "text/yaml")
        .body(SCHEMATIC)
        .send()
        .await
        .map_err(|source| StageError::Http {
            url: url.clone(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(StageError::Status {
            url,
            status: response.status(),
        });
    }

    let body = response.bytes().await.map_err(|source| StageError::Http {
        url: url.clone(),
        source,
    })?;
    parse_schematic(&body)
}

fn parse_schematic(body: &[u8]) -> Result<String, StageError> {
    let schematic: SchematicResponse = serde_json::from_slice(body)
        .map_err(|e| StageError::InvalidResponse(e.to_string()))?;

    if schematic.id.is_empty() {
        return Err(StageError::InvalidResponse("empty schematic id".to_string()));
    }
    Ok(schematic.id)
}
