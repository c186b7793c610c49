/// Engine boundary module
///
/// Everything that crosses over to the external processing engine lives
/// here:
/// - The gateway trait and error taxonomy the controller programs against
///   (gateway.rs)
/// - The production gateway that invokes the engine binary and speaks its
///   JSON envelope protocol (process.rs)

pub mod gateway;
pub mod process;

pub use gateway::{ConvertSummary, EngineError, EngineGateway, FilePayload};
pub use process::ProcessEngineGateway;
