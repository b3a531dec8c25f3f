use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("no output device available")]
  NoDevice,
  #[error("output device has no usable config: {0}")]
  DeviceConfig(String),
  #[error("failed to build output stream: {0}")]
  BuildStream(#[from] cpal::BuildStreamError),
  #[error("failed to start output stream: {0}")]
  PlayStream(#[from] cpal::PlayStreamError),
  #[error("engine is not initialized")]
  NotInitialized,
  #[error("invalid engine config: {0}")]
  Config(String),
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
}
