//! Named sound bundles. Applying one is a batch of parameter writes; it never
//! touches voices that are already sounding.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::engine::dsp::filter::FilterType;
use crate::engine::envelope::EnvelopeMode;
use crate::engine::modulation::ModRoute;
use crate::engine::params::{
  DelayState, EffectsState, EnvelopeSettings, FilterState, ModulationState, ReverbState, SynthParams,
};
use crate::engine::voice::Waveform;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
  pub name: String,
  pub waveform: Waveform,
  pub volume: f32,
  #[serde(default)]
  pub envelope_mode: EnvelopeMode,
  pub attack_time: f32,
  pub decay_time: f32,
  pub sustain_level: f32,
  pub release_time: f32,
  pub filter_type: FilterType,
  pub filter_cutoff: f32,
  pub filter_resonance: f32,
  #[serde(alias = "reverbWet")]
  pub reverb_amount: f32,
  pub delay_time: f32,
  pub delay_feedback: f32,
  pub delay_mix: f32,
  pub lfo_enabled: bool,
  pub lfo_rate: f32,
  pub lfo_depth: f32,
  pub lfo_target: ModRoute,
}

impl Preset {
  /// Octave shift is left at zero; it belongs to the performer.
  pub fn to_params(&self) -> SynthParams {
    SynthParams {
      waveform: self.waveform,
      volume: self.volume,
      octave_shift: 0,
      envelope: EnvelopeSettings {
        mode: self.envelope_mode,
        attack_time: self.attack_time,
        decay_time: self.decay_time,
        sustain_level: self.sustain_level,
        release_time: self.release_time,
      },
      effects: EffectsState {
        filter: FilterState { kind: self.filter_type, cutoff_hz: self.filter_cutoff, resonance: self.filter_resonance },
        delay: DelayState { time_s: self.delay_time, feedback: self.delay_feedback, mix: self.delay_mix },
        reverb: ReverbState { wet: self.reverb_amount },
      },
      modulation: ModulationState { enabled: self.lfo_enabled, rate_hz: self.lfo_rate, depth: self.lfo_depth, target: self.lfo_target },
    }
  }

  pub fn from_params(name: &str, p: &SynthParams) -> Self {
    let e = &p.envelope; let fx = &p.effects; let m = &p.modulation;
    Self {
      name: name.to_string(),
      waveform: p.waveform,
      volume: p.volume,
      envelope_mode: e.mode,
      attack_time: e.attack_time,
      decay_time: e.decay_time,
      sustain_level: e.sustain_level,
      release_time: e.release_time,
      filter_type: fx.filter.kind,
      filter_cutoff: fx.filter.cutoff_hz,
      filter_resonance: fx.filter.resonance,
      reverb_amount: fx.reverb.wet,
      delay_time: fx.delay.time_s,
      delay_feedback: fx.delay.feedback,
      delay_mix: fx.delay.mix,
      lfo_enabled: m.enabled,
      lfo_rate: m.rate_hz,
      lfo_depth: m.depth,
      lfo_target: m.target,
    }
  }
}

#[allow(clippy::too_many_arguments)]
fn preset(
  name: &str, waveform: Waveform, volume: f32, (a, d, s, r): (f32, f32, f32, f32),
  (filter_type, cutoff, q): (FilterType, f32, f32), reverb: f32, (dt, dfb, dmix): (f32, f32, f32),
  (lfo_on, rate, depth, target): (bool, f32, f32, ModRoute),
) -> Preset {
  Preset {
    name: name.to_string(), waveform, volume, envelope_mode: EnvelopeMode::Adsr,
    attack_time: a, decay_time: d, sustain_level: s, release_time: r,
    filter_type, filter_cutoff: cutoff, filter_resonance: q, reverb_amount: reverb,
    delay_time: dt, delay_feedback: dfb, delay_mix: dmix,
    lfo_enabled: lfo_on, lfo_rate: rate, lfo_depth: depth, lfo_target: target,
  }
}

pub static FACTORY_PRESETS: Lazy<Vec<Preset>> = Lazy::new(|| {
  use FilterType::*;
  use ModRoute::*;
  vec![
    preset("Default", Waveform::Sine, 0.5, (0.1, 0.2, 0.7, 0.3), (Lowpass, 20_000.0, 1.0), 0.1, (0.3, 0.2, 0.1), (false, 5.0, 5.0, Filter)),
    preset("Spacey Pad", Waveform::Sine, 0.4, (0.8, 0.4, 0.6, 1.5), (Lowpass, 2000.0, 2.0), 0.6, (0.5, 0.4, 0.3), (true, 0.5, 10.0, Filter)),
    preset("Bass", Waveform::Sawtooth, 0.6, (0.05, 0.2, 0.4, 0.1), (Lowpass, 800.0, 4.0), 0.1, (0.2, 0.1, 0.05), (false, 5.0, 5.0, Filter)),
    preset("Plucky Lead", Waveform::Square, 0.5, (0.01, 0.1, 0.3, 0.2), (Highpass, 800.0, 3.0), 0.2, (0.25, 0.3, 0.15), (true, 6.0, 3.0, Pitch)),
    preset("Ambient Drone", Waveform::Triangle, 0.4, (1.0, 0.5, 0.8, 2.0), (Bandpass, 1200.0, 8.0), 0.7, (0.7, 0.6, 0.4), (true, 0.2, 20.0, Filter)),
  ]
});

/// Case-insensitive lookup among the factory presets.
pub fn find(name: &str) -> Option<&'static Preset> {
  FACTORY_PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_preset_matches_default_params() {
    assert_eq!(find("default").map(Preset::to_params), Some(SynthParams::default()));
  }

  #[test]
  fn factory_presets_are_in_range() {
    for p in FACTORY_PRESETS.iter() {
      let params = p.to_params();
      let mut clamped = params;
      for w in params.to_params() { clamped.apply(w); }
      assert_eq!(params, clamped, "{} has out-of-range values", p.name);
    }
  }

  #[test]
  fn parses_camel_case_json() {
    let json = serde_json::to_string(find("Plucky Lead").unwrap()).unwrap();
    assert!(json.contains("\"lfoTarget\":\"pitch\""));
    assert!(json.contains("\"filterType\":\"highpass\""));
    let back: Preset = serde_json::from_str(&json).unwrap();
    assert_eq!(back.lfo_target, ModRoute::Pitch);
    let legacy = json.replace("\"envelopeMode\":\"adsr\",", "");
    let back: Preset = serde_json::from_str(&legacy).unwrap();
    assert_eq!(back.envelope_mode, EnvelopeMode::Adsr);
  }
}
