use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Engine sizing and device preferences. Every field has a working default, so
/// a JSON file only needs the keys it wants to change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
  /// Size of the fixed voice pool; notes beyond it steal.
  pub max_voices: usize,
  /// Tried in order against the device's supported stereo f32 ranges.
  pub preferred_sample_rates: Vec<u32>,
  pub buffer_frames: u32,
  pub queue_capacity: usize,
  /// Control messages applied per audio callback at most.
  pub max_msgs_per_block: usize,
  pub scope_frame: usize,
  pub scope_buffers: usize,
  /// Sample rate used when rendering without a device.
  pub offline_sample_rate: u32,
  pub offline_block: usize,
  pub reverb_seconds: f32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_voices: 32,
      preferred_sample_rates: vec![44_100, 48_000],
      buffer_frames: 1024,
      queue_capacity: 256,
      max_msgs_per_block: 24,
      scope_frame: 2048,
      scope_buffers: 4,
      offline_sample_rate: 48_000,
      offline_block: 128,
      reverb_seconds: 2.0,
    }
  }
}

impl EngineConfig {
  pub fn from_json_str(s: &str) -> Result<Self, EngineError> {
    let cfg: Self = serde_json::from_str(s)?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  pub fn validate(&self) -> Result<(), EngineError> {
    if self.max_voices == 0 { return Err(EngineError::Config("maxVoices must be at least 1".into())); }
    if self.queue_capacity == 0 { return Err(EngineError::Config("queueCapacity must be at least 1".into())); }
    if self.max_msgs_per_block == 0 { return Err(EngineError::Config("maxMsgsPerBlock must be at least 1".into())); }
    if self.offline_sample_rate < 1000 { return Err(EngineError::Config(format!("offlineSampleRate {} is too low", self.offline_sample_rate))); }
    if !(self.reverb_seconds > 0.0 && self.reverb_seconds <= 10.0) {
      return Err(EngineError::Config(format!("reverbSeconds {} out of (0, 10]", self.reverb_seconds)));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_json_keeps_defaults() {
    let cfg = EngineConfig::from_json_str(r#"{ "maxVoices": 8, "bufferFrames": 512 }"#).unwrap();
    assert_eq!(cfg.max_voices, 8);
    assert_eq!(cfg.buffer_frames, 512);
    assert_eq!(cfg.max_msgs_per_block, 24);
    assert_eq!(cfg.preferred_sample_rates, vec![44_100, 48_000]);
  }

  #[test]
  fn rejects_unusable_values() {
    assert!(matches!(EngineConfig::from_json_str(r#"{ "maxVoices": 0 }"#), Err(EngineError::Config(_))));
    assert!(matches!(EngineConfig::from_json_str(r#"{ "reverbSeconds": -1 }"#), Err(EngineError::Config(_))));
    assert!(matches!(EngineConfig::from_json_str("not json"), Err(EngineError::Json(_))));
  }
}
