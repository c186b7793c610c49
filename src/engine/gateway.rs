/// The narrow interface to the external processing engine
///
/// Four request/response operations, each a single round trip with no
/// streaming, no implicit retry, and at-most-once semantics. The controller
/// only ever talks to the engine through this trait, which keeps the
/// session logic testable against a mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::options::ConvertOptions;

/// Why an engine call failed
///
/// A non-zero `failed` count inside a successful batch reply is NOT one of
/// these — partial batch failure is reported through `ConvertSummary`, not
/// as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine process or its channel could not be reached at all
    #[error("engine unreachable: {0}")]
    Unreachable(String),
    /// The engine received the request but refused or failed to process it
    #[error("engine rejected request: {0}")]
    Rejected(String),
    /// Preset lookup miss
    #[error("preset not found: {0}")]
    NotFound(String),
}

/// One file of a batch request, name plus materialized bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePayload {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// What a successful batch conversion reports back
///
/// Per-file failures are aggregated into `failed`; the engine never
/// enumerates which files they were.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertSummary {
    pub output_dir: String,
    pub succeeded: usize,
    pub failed: usize,
}

/// The engine's four operations
#[async_trait]
pub trait EngineGateway: Send + Sync {
    /// Transform one image and return the rendered PNG bytes
    async fn preview(
        &self,
        options: ConvertOptions,
        image_bytes: Vec<u8>,
    ) -> Result<Vec<u8>, EngineError>;

    /// Convert every file of the batch under `output_root`
    async fn convert_batch(
        &self,
        options: ConvertOptions,
        files: Vec<FilePayload>,
        output_root: String,
        saturation: Option<f32>,
    ) -> Result<ConvertSummary, EngineError>;

    /// Persist a named option set (storage is owned by the engine)
    async fn save_preset(&self, name: String, options: ConvertOptions) -> Result<(), EngineError>;

    /// Fetch a previously saved option set
    async fn load_preset(&self, name: String) -> Result<ConvertOptions, EngineError>;
}
