//! Typed synth parameters, their ranges, and name-based parsing.
//!
//! Out-of-range values are clamped, never rejected. Both the control side
//! (`Synth`) and the render side (`EngineGraph`) keep a `SynthParams` and run
//! every write through [`SynthParams::apply`], so both copies stay in range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::dsp::filter::FilterType;
use super::envelope::{EnvelopeMode, EnvelopeSpec};
use super::messages::ParamValue;
use super::modulation::ModRoute;
use super::voice::Waveform;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range { pub min: f32, pub max: f32 }

impl Range {
  pub const fn new(min: f32, max: f32) -> Self { Self { min, max } }
  /// NaN lands on the lower bound.
  #[inline]
  pub fn clamp(&self, v: f32) -> f32 { if v.is_nan() { self.min } else { v.clamp(self.min, self.max) } }
}

pub const VOLUME: Range = Range::new(0.0, 1.0);
pub const ATTACK: Range = Range::new(0.01, 1.0);
pub const DECAY: Range = Range::new(0.01, 1.0);
pub const SUSTAIN: Range = Range::new(0.0, 1.0);
pub const RELEASE: Range = Range::new(0.01, 2.0);
pub const CUTOFF: Range = Range::new(20.0, 20_000.0);
pub const RESONANCE: Range = Range::new(0.1, 20.0);
pub const DELAY_TIME: Range = Range::new(0.05, 1.0);
pub const DELAY_FEEDBACK: Range = Range::new(0.0, 0.9);
pub const DELAY_MIX: Range = Range::new(0.0, 0.9);
pub const REVERB_WET: Range = Range::new(0.0, 0.9);
pub const LFO_RATE: Range = Range::new(0.1, 20.0);
pub const LFO_DEPTH: Range = Range::new(1.0, 100.0);
pub const OCTAVE_MIN: i32 = -2;
pub const OCTAVE_MAX: i32 = 2;

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
  #[error("unknown parameter `{0}`")]
  UnknownName(String),
  #[error("parameter `{name}` cannot take {value:?}")]
  BadValue { name: &'static str, value: ParamValue },
}

/// One parameter write. Produced by [`Param::parse`] or built directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Param {
  Waveform(Waveform),
  Volume(f32),
  EnvelopeMode(EnvelopeMode),
  Attack(f32),
  Decay(f32),
  Sustain(f32),
  Release(f32),
  FilterType(FilterType),
  FilterCutoff(f32),
  FilterResonance(f32),
  DelayTime(f32),
  DelayFeedback(f32),
  DelayMix(f32),
  ReverbWet(f32),
  LfoEnabled(bool),
  LfoRate(f32),
  LfoDepth(f32),
  LfoTarget(ModRoute),
  OctaveShift(i32),
}

fn as_f32(v: &ParamValue) -> Option<f32> {
  match v {
    ParamValue::F32(x) => Some(*x),
    ParamValue::I32(x) => Some(*x as f32),
    ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
    ParamValue::Str(s) => s.trim().parse().ok(),
  }
}

fn as_i32(v: &ParamValue) -> Option<i32> {
  match v {
    ParamValue::I32(x) => Some(*x),
    ParamValue::F32(x) if x.is_finite() => Some(x.round().clamp(i32::MIN as f32, i32::MAX as f32) as i32),
    ParamValue::Str(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn as_bool(v: &ParamValue) -> Option<bool> {
  match v {
    ParamValue::Bool(b) => Some(*b),
    ParamValue::I32(x) => Some(*x != 0),
    ParamValue::F32(x) => Some(*x != 0.0),
    ParamValue::Str(s) => match s.trim().to_ascii_lowercase().as_str() { "true" | "on" | "1" => Some(true), "false" | "off" | "0" => Some(false), _ => None },
  }
}

/// Enumerated parameters accept their name or an index.
fn as_enum<T>(v: &ParamValue, by_name: fn(&str) -> Option<T>, by_index: fn(i32) -> T) -> Option<T> {
  match v {
    ParamValue::Str(s) => by_name(s.trim()),
    ParamValue::I32(i) => Some(by_index(*i)),
    _ => None,
  }
}

fn route_from_index(i: i32) -> ModRoute { if i == 1 { ModRoute::Pitch } else { ModRoute::Filter } }
fn mode_from_index(i: i32) -> EnvelopeMode { if i == 0 { EnvelopeMode::Ar } else { EnvelopeMode::Adsr } }

impl Param {
  /// Names follow the instrument's control labels (`filterCutoff`, `reverbWet`, ...).
  pub fn parse(name: &str, value: &ParamValue) -> Result<Param, ParamError> {
    let bad = |name: &'static str| ParamError::BadValue { name, value: value.clone() };
    let p = match name {
      "waveform" => Param::Waveform(as_enum(value, Waveform::from_name, Waveform::from_index).ok_or_else(|| bad("waveform"))?),
      "volume" => Param::Volume(as_f32(value).ok_or_else(|| bad("volume"))?),
      "envelopeMode" => Param::EnvelopeMode(as_enum(value, EnvelopeMode::from_name, mode_from_index).ok_or_else(|| bad("envelopeMode"))?),
      "attackTime" | "attack" => Param::Attack(as_f32(value).ok_or_else(|| bad("attackTime"))?),
      "decayTime" | "decay" => Param::Decay(as_f32(value).ok_or_else(|| bad("decayTime"))?),
      "sustainLevel" | "sustain" => Param::Sustain(as_f32(value).ok_or_else(|| bad("sustainLevel"))?),
      "releaseTime" | "release" => Param::Release(as_f32(value).ok_or_else(|| bad("releaseTime"))?),
      "filterType" => Param::FilterType(as_enum(value, FilterType::from_name, FilterType::from_index).ok_or_else(|| bad("filterType"))?),
      "filterCutoff" => Param::FilterCutoff(as_f32(value).ok_or_else(|| bad("filterCutoff"))?),
      "filterResonance" | "filterQ" => Param::FilterResonance(as_f32(value).ok_or_else(|| bad("filterResonance"))?),
      "delayTime" => Param::DelayTime(as_f32(value).ok_or_else(|| bad("delayTime"))?),
      "delayFeedback" => Param::DelayFeedback(as_f32(value).ok_or_else(|| bad("delayFeedback"))?),
      "delayMix" => Param::DelayMix(as_f32(value).ok_or_else(|| bad("delayMix"))?),
      "reverbWet" | "reverbAmount" => Param::ReverbWet(as_f32(value).ok_or_else(|| bad("reverbWet"))?),
      "lfoEnabled" => Param::LfoEnabled(as_bool(value).ok_or_else(|| bad("lfoEnabled"))?),
      "lfoRate" => Param::LfoRate(as_f32(value).ok_or_else(|| bad("lfoRate"))?),
      "lfoDepth" => Param::LfoDepth(as_f32(value).ok_or_else(|| bad("lfoDepth"))?),
      "lfoTarget" => Param::LfoTarget(as_enum(value, ModRoute::from_name, route_from_index).ok_or_else(|| bad("lfoTarget"))?),
      "octaveShift" => Param::OctaveShift(as_i32(value).ok_or_else(|| bad("octaveShift"))?),
      other => return Err(ParamError::UnknownName(other.to_string())),
    };
    Ok(p)
  }

  pub fn name(&self) -> &'static str {
    match self {
      Param::Waveform(_) => "waveform",
      Param::Volume(_) => "volume",
      Param::EnvelopeMode(_) => "envelopeMode",
      Param::Attack(_) => "attackTime",
      Param::Decay(_) => "decayTime",
      Param::Sustain(_) => "sustainLevel",
      Param::Release(_) => "releaseTime",
      Param::FilterType(_) => "filterType",
      Param::FilterCutoff(_) => "filterCutoff",
      Param::FilterResonance(_) => "filterResonance",
      Param::DelayTime(_) => "delayTime",
      Param::DelayFeedback(_) => "delayFeedback",
      Param::DelayMix(_) => "delayMix",
      Param::ReverbWet(_) => "reverbWet",
      Param::LfoEnabled(_) => "lfoEnabled",
      Param::LfoRate(_) => "lfoRate",
      Param::LfoDepth(_) => "lfoDepth",
      Param::LfoTarget(_) => "lfoTarget",
      Param::OctaveShift(_) => "octaveShift",
    }
  }

  pub fn clamped(self) -> Param {
    match self {
      Param::Volume(v) => Param::Volume(VOLUME.clamp(v)),
      Param::Attack(v) => Param::Attack(ATTACK.clamp(v)),
      Param::Decay(v) => Param::Decay(DECAY.clamp(v)),
      Param::Sustain(v) => Param::Sustain(SUSTAIN.clamp(v)),
      Param::Release(v) => Param::Release(RELEASE.clamp(v)),
      Param::FilterCutoff(v) => Param::FilterCutoff(CUTOFF.clamp(v)),
      Param::FilterResonance(v) => Param::FilterResonance(RESONANCE.clamp(v)),
      Param::DelayTime(v) => Param::DelayTime(DELAY_TIME.clamp(v)),
      Param::DelayFeedback(v) => Param::DelayFeedback(DELAY_FEEDBACK.clamp(v)),
      Param::DelayMix(v) => Param::DelayMix(DELAY_MIX.clamp(v)),
      Param::ReverbWet(v) => Param::ReverbWet(REVERB_WET.clamp(v)),
      Param::LfoRate(v) => Param::LfoRate(LFO_RATE.clamp(v)),
      Param::LfoDepth(v) => Param::LfoDepth(LFO_DEPTH.clamp(v)),
      Param::OctaveShift(v) => Param::OctaveShift(v.clamp(OCTAVE_MIN, OCTAVE_MAX)),
      other => other,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeSettings {
  #[serde(default)]
  pub mode: EnvelopeMode,
  pub attack_time: f32,
  pub decay_time: f32,
  pub sustain_level: f32,
  pub release_time: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState { pub kind: FilterType, pub cutoff_hz: f32, pub resonance: f32 }

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayState { pub time_s: f32, pub feedback: f32, pub mix: f32 }

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbState { pub wet: f32 }

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsState { pub filter: FilterState, pub delay: DelayState, pub reverb: ReverbState }

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulationState { pub enabled: bool, pub rate_hz: f32, pub depth: f32, pub target: ModRoute }

/// Every user-facing setting of the instrument.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthParams {
  pub waveform: Waveform,
  pub volume: f32,
  pub octave_shift: i32,
  pub envelope: EnvelopeSettings,
  pub effects: EffectsState,
  pub modulation: ModulationState,
}

impl Default for SynthParams {
  fn default() -> Self {
    Self {
      waveform: Waveform::Sine,
      volume: 0.5,
      octave_shift: 0,
      envelope: EnvelopeSettings { mode: EnvelopeMode::Adsr, attack_time: 0.1, decay_time: 0.2, sustain_level: 0.7, release_time: 0.3 },
      effects: EffectsState {
        filter: FilterState { kind: FilterType::Lowpass, cutoff_hz: 20_000.0, resonance: 1.0 },
        delay: DelayState { time_s: 0.3, feedback: 0.2, mix: 0.1 },
        reverb: ReverbState { wet: 0.1 },
      },
      modulation: ModulationState { enabled: false, rate_hz: 5.0, depth: 5.0, target: ModRoute::Filter },
    }
  }
}

impl SynthParams {
  /// Store a write, returning the clamped value that was actually stored.
  pub fn apply(&mut self, p: Param) -> Param {
    let p = p.clamped();
    match p {
      Param::Waveform(w) => self.waveform = w,
      Param::Volume(v) => self.volume = v,
      Param::EnvelopeMode(m) => self.envelope.mode = m,
      Param::Attack(v) => self.envelope.attack_time = v,
      Param::Decay(v) => self.envelope.decay_time = v,
      Param::Sustain(v) => self.envelope.sustain_level = v,
      Param::Release(v) => self.envelope.release_time = v,
      Param::FilterType(t) => self.effects.filter.kind = t,
      Param::FilterCutoff(v) => self.effects.filter.cutoff_hz = v,
      Param::FilterResonance(v) => self.effects.filter.resonance = v,
      Param::DelayTime(v) => self.effects.delay.time_s = v,
      Param::DelayFeedback(v) => self.effects.delay.feedback = v,
      Param::DelayMix(v) => self.effects.delay.mix = v,
      Param::ReverbWet(v) => self.effects.reverb.wet = v,
      Param::LfoEnabled(b) => self.modulation.enabled = b,
      Param::LfoRate(v) => self.modulation.rate_hz = v,
      Param::LfoDepth(v) => self.modulation.depth = v,
      Param::LfoTarget(t) => self.modulation.target = t,
      Param::OctaveShift(v) => self.octave_shift = v,
    }
    p
  }

  /// The whole state as a batch of writes (octave shift excluded; it is a
  /// performance control, not part of a sound).
  pub fn to_params(&self) -> [Param; 18] {
    let e = &self.envelope; let fx = &self.effects; let m = &self.modulation;
    [
      Param::Waveform(self.waveform), Param::Volume(self.volume),
      Param::EnvelopeMode(e.mode), Param::Attack(e.attack_time), Param::Decay(e.decay_time), Param::Sustain(e.sustain_level), Param::Release(e.release_time),
      Param::FilterType(fx.filter.kind), Param::FilterCutoff(fx.filter.cutoff_hz), Param::FilterResonance(fx.filter.resonance),
      Param::DelayTime(fx.delay.time_s), Param::DelayFeedback(fx.delay.feedback), Param::DelayMix(fx.delay.mix),
      Param::ReverbWet(fx.reverb.wet),
      Param::LfoEnabled(m.enabled), Param::LfoRate(m.rate_hz), Param::LfoDepth(m.depth), Param::LfoTarget(m.target),
    ]
  }

  /// Envelope snapshot for a note triggered now. Peak follows the volume.
  pub fn envelope_spec(&self) -> EnvelopeSpec {
    let e = &self.envelope;
    EnvelopeSpec { mode: e.mode, attack: e.attack_time as f64, decay: e.decay_time as f64, sustain: e.sustain_level, release: e.release_time as f64, peak: self.volume }
  }
}
