pub mod engine {
  pub mod audio;
  pub mod dsp;
  pub mod effects;
  pub mod envelope;
  pub mod graph;
  pub mod messages;
  pub mod modulation;
  pub mod params;
  pub mod state;
  pub mod voice;
  pub mod voice_manager;
}
pub mod config;
pub mod error;
pub mod keyboard;
pub mod presets;
pub mod synth;

pub use config::EngineConfig;
pub use engine::messages::ParamValue;
pub use engine::params::{Param, SynthParams};
pub use engine::voice::NoteId;
pub use error::EngineError;
pub use presets::{Preset, FACTORY_PRESETS};
pub use synth::Synth;

/// Info for our own targets; device backends are kept at Warn. `RUST_LOG`
/// still wins for anything it names.
pub fn init_logging() {
  let _ = env_logger::Builder::new()
    .filter_level(log::LevelFilter::Info)
    // Reduce noisy library INFO logs while keeping our app logs visible.
    .filter_module("cpal", log::LevelFilter::Warn)
    .parse_default_env()
    .try_init();
}
