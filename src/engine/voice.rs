use std::f32::consts::PI;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::envelope::{self, EnvelopeSpec, Schedule};

/// Opaque identity of one key (a character code, scancode, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub u32);

impl From<char> for NoteId {
  fn from(c: char) -> Self { Self(c as u32) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform { #[default] Sine, Square, Triangle, Sawtooth }

impl Waveform {
  pub fn from_name(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "sine" => Some(Self::Sine),
      "square" => Some(Self::Square),
      "triangle" | "tri" => Some(Self::Triangle),
      "sawtooth" | "saw" => Some(Self::Sawtooth),
      _ => None,
    }
  }
  pub fn from_index(i: i32) -> Self {
    match i { 1 => Self::Square, 2 => Self::Triangle, 3 => Self::Sawtooth, _ => Self::Sine }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceStage { Triggered, Sustaining, Releasing, Retired }

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoiceError {
  #[error("voice {0} already stopped")]
  AlreadyStopped(u64),
  #[error("slot {slot} no longer holds voice {id}")]
  StaleSlot { slot: usize, id: u64 },
}

#[derive(Clone, Copy)]
struct Osc {
  phase: f32,
  sr: f32,
}

impl Osc {
  fn new(sr: f32) -> Self { Self { phase: 0.0, sr } }
  #[inline]
  fn next(&mut self, freq: f32, shape: Waveform) -> f32 {
    let p = self.phase;
    self.phase = (self.phase + freq.max(0.0) / self.sr).fract();
    match shape {
      Waveform::Sine => (2.0 * PI * p).sin(),
      Waveform::Sawtooth => 2.0 * (p - 0.5),
      Waveform::Square => if p < 0.5 { 1.0 } else { -1.0 },
      Waveform::Triangle => 2.0 * (2.0 * ((p + 0.25) % 1.0) - 1.0).abs() - 1.0,
    }
  }
}

/// One sounding note: an oscillator whose gain follows an envelope schedule.
#[derive(Clone)]
pub struct Voice {
  pub id: u64,
  pub note: NoteId,
  pub waveform: Waveform,
  pub freq: f32,
  pub start_time: f64,
  pub env: EnvelopeSpec,
  amp: Schedule,
  osc: Osc,
  // Hz of deviation at full LFO swing; captured at trigger, never rewired.
  pitch_tap: Option<f32>,
  stop_at: Option<f64>,
  releasing: bool,
  retiring: bool,
  stopped: bool,
}

impl Voice {
  #[allow(clippy::too_many_arguments)]
  pub fn new(id: u64, note: NoteId, waveform: Waveform, freq: f32, env: EnvelopeSpec, amp: Schedule, sr: f32, pitch_tap: Option<f32>) -> Self {
    Self { id, note, waveform, freq, start_time: amp.start_time(), env, amp, osc: Osc::new(sr), pitch_tap, stop_at: None, releasing: false, retiring: false, stopped: false }
  }

  pub fn level_at(&self, t: f64) -> f32 {
    if self.is_finished(t) { 0.0 } else { self.amp.value_at(t) }
  }

  pub fn stage(&self, t: f64) -> VoiceStage {
    if self.is_finished(t) { VoiceStage::Retired }
    else if self.releasing { VoiceStage::Releasing }
    else if self.amp.is_settled(t) { VoiceStage::Sustaining }
    else { VoiceStage::Triggered }
  }

  pub fn pitch_tap(&self) -> Option<f32> { self.pitch_tap }
  pub fn is_retiring(&self) -> bool { self.retiring }
  pub fn stop_time(&self) -> Option<f64> { self.stop_at }
  pub fn is_finished(&self, t: f64) -> bool { self.stopped || self.stop_at.is_some_and(|s| t >= s) }

  /// Replace whatever is scheduled with a ramp from the live level to zero.
  pub fn release(&mut self, now: f64, release_time: f64) -> Result<(), VoiceError> {
    if self.is_finished(now) { return Err(VoiceError::AlreadyStopped(self.id)); }
    let live = self.amp.value_at(now);
    self.amp = envelope::release(live, now, release_time);
    self.releasing = true;
    Ok(())
  }

  /// A later request never postpones an earlier stop.
  pub fn schedule_stop(&mut self, at: f64) -> Result<(), VoiceError> {
    if self.stopped { return Err(VoiceError::AlreadyStopped(self.id)); }
    self.stop_at = Some(self.stop_at.map_or(at, |s| s.min(at)));
    Ok(())
  }

  /// Gain to zero and oscillator halted right now, no ramp.
  pub fn hard_stop(&mut self, now: f64) -> Result<(), VoiceError> {
    if self.stopped { return Err(VoiceError::AlreadyStopped(self.id)); }
    self.amp = Schedule::hold(now, 0.0);
    self.stop_at = Some(now);
    self.stopped = true;
    Ok(())
  }

  pub fn mark_retiring(&mut self) { self.retiring = true; }

  /// One output sample at time `t`. `lfo` is the shared gated LFO signal in [-1, 1].
  #[inline]
  pub fn next(&mut self, t: f64, lfo: f32) -> f32 {
    if self.is_finished(t) { return 0.0; }
    let f = match self.pitch_tap { Some(dev) => self.freq + dev * lfo, None => self.freq };
    self.osc.next(f, self.waveform) * self.amp.value_at(t)
  }
}
