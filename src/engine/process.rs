/// Production gateway: one engine process invocation per call
///
/// The engine is a separate native binary. Every operation spawns it fresh,
/// writes a single JSON request envelope to its stdin, and reads a single
/// JSON reply envelope from its stdout — one call, one round trip. There is
/// no retry and no timeout at this layer; a call that never resolves leaves
/// its task slot pending.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::gateway::{ConvertSummary, EngineError, EngineGateway, FilePayload};
use crate::state::options::ConvertOptions;

/// Engine binary name looked up on PATH when no override is given
const DEFAULT_ENGINE_BIN: &str = "pixmix-engine";

/// Environment variable that overrides the engine binary location
const ENGINE_BIN_ENV: &str = "PIXMIX_ENGINE";

/// Request envelope: `{"cmd": "...", "payload": {...}}`
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", content = "payload", rename_all = "snake_case")]
enum EngineRequest {
    GeneratePreview(PreviewPayload),
    ConvertAll(ConvertAllPayload),
    SavePreset(PresetPayload),
    LoadPreset(PresetNamePayload),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewPayload {
    options: ConvertOptions,
    image_bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertAllPayload {
    options: ConvertOptions,
    files: Vec<FilePayload>,
    output_root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    saturation: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresetPayload {
    name: String,
    options: ConvertOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresetNamePayload {
    name: String,
}

/// Reply envelope: `{"ok": true, "data": ...}` on success,
/// `{"ok": false, "code": "...", "message": "..."}` on failure
#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    ok: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Engine-reported preview reply body
#[derive(Debug, Deserialize)]
struct PreviewReply {
    bytes: Vec<u8>,
}

/// Turn raw engine stdout into the reply's `data` value or a typed error
///
/// Garbage on the wire counts as a channel failure, not an engine verdict.
fn parse_reply(stdout: &[u8]) -> Result<Value, EngineError> {
    let envelope: ReplyEnvelope = serde_json::from_slice(stdout)
        .map_err(|e| EngineError::Unreachable(format!("engine reply was not valid JSON: {}", e)))?;

    if envelope.ok {
        return Ok(envelope.data);
    }

    let message = envelope
        .message
        .unwrap_or_else(|| "engine reported an unspecified failure".to_string());
    match envelope.code.as_deref() {
        Some("not_found") => Err(EngineError::NotFound(message)),
        _ => Err(EngineError::Rejected(message)),
    }
}

/// Gateway that shells out to the engine binary for every call
#[derive(Debug, Clone)]
pub struct ProcessEngineGateway {
    engine_bin: PathBuf,
}

impl ProcessEngineGateway {
    pub fn new(engine_bin: PathBuf) -> Self {
        Self { engine_bin }
    }

    /// Resolve the engine binary from the environment, falling back to PATH
    pub fn from_env() -> Self {
        let engine_bin = std::env::var_os(ENGINE_BIN_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE_BIN));
        Self::new(engine_bin)
    }

    /// One full round trip: spawn, write the envelope, collect the reply
    async fn invoke(&self, request: &EngineRequest) -> Result<Value, EngineError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| EngineError::Unreachable(format!("could not encode request: {}", e)))?;

        debug!("invoking engine {:?}", self.engine_bin);

        let mut child = Command::new(&self.engine_bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::Unreachable(format!(
                    "could not start {}: {}",
                    self.engine_bin.display(),
                    e
                ))
            })?;

        // Closing stdin after the write signals the engine that the request
        // is complete
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unreachable("engine stdin unavailable".to_string()))?;
        stdin
            .write_all(&body)
            .await
            .map_err(|e| EngineError::Unreachable(format!("could not write request: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EngineError::Unreachable(format!("engine did not complete: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Unreachable(format!(
                "engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_reply(&output.stdout)
    }
}

#[async_trait]
impl EngineGateway for ProcessEngineGateway {
    async fn preview(
        &self,
        options: ConvertOptions,
        image_bytes: Vec<u8>,
    ) -> Result<Vec<u8>, EngineError> {
        let request = EngineRequest::GeneratePreview(PreviewPayload {
            options,
            image_bytes,
        });
        let data = self.invoke(&request).await?;
        let reply: PreviewReply = serde_json::from_value(data)
            .map_err(|e| EngineError::Unreachable(format!("malformed preview reply: {}", e)))?;
        Ok(reply.bytes)
    }

    async fn convert_batch(
        &self,
        options: ConvertOptions,
        files: Vec<FilePayload>,
        output_root: String,
        saturation: Option<f32>,
    ) -> Result<ConvertSummary, EngineError> {
        let request = EngineRequest::ConvertAll(ConvertAllPayload {
            options,
            files,
            output_root,
            saturation,
        });
        let data = self.invoke(&request).await?;
        serde_json::from_value(data)
            .map_err(|e| EngineError::Unreachable(format!("malformed convert reply: {}", e)))
    }

    async fn save_preset(&self, name: String, options: ConvertOptions) -> Result<(), EngineError> {
        let request = EngineRequest::SavePreset(PresetPayload { name, options });
        self.invoke(&request).await?;
        Ok(())
    }

    async fn load_preset(&self, name: String) -> Result<ConvertOptions, EngineError> {
        let request = EngineRequest::LoadPreset(PresetNamePayload { name });
        let data = self.invoke(&request).await?;
        serde_json::from_value(data)
            .map_err(|e| EngineError::Unreachable(format!("malformed preset reply: {}", e)))
    }
}
