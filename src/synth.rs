//! Control-thread handle for the whole instrument.
//!
//! The `Synth` keeps a mirror of every parameter so reads never touch the
//! render thread, and forwards each change through a bounded queue. Before
//! `initialize` succeeds, parameter writes only update the mirror (the graph is
//! built from it) and note events are dropped.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::config::EngineConfig;
use crate::engine::audio::AudioEngine;
use crate::engine::graph::EngineGraph;
use crate::engine::messages::{EngineMsg, ParamValue};
use crate::engine::params::{self, Param, SynthParams};
use crate::engine::state::{scope_pair, EngineStatus, ScopeReader, StatusSnapshot};
use crate::engine::voice::NoteId;
use crate::error::EngineError;
use crate::keyboard::{self, KeyAction};
use crate::presets::{self, Preset};

enum Output {
  Device(Option<AudioEngine>),
  Offline { sr: f32, graph: Option<(EngineGraph, Receiver<EngineMsg>)> },
}

pub struct Synth {
  config: EngineConfig,
  params: SynthParams,
  tx: Option<Sender<EngineMsg>>,
  output: Output,
  status: Arc<EngineStatus>,
}

impl Synth {
  /// Plays through the default output device once initialized.
  pub fn new(config: EngineConfig) -> Self {
    Self { config, params: SynthParams::default(), tx: None, output: Output::Device(None), status: EngineStatus::new() }
  }

  /// Renders on demand through [`Synth::render`] instead of a device.
  pub fn offline(config: EngineConfig) -> Self {
    let sr = config.offline_sample_rate as f32;
    Self { config, params: SynthParams::default(), tx: None, output: Output::Offline { sr, graph: None }, status: EngineStatus::new() }
  }

  pub fn is_initialized(&self) -> bool { self.tx.is_some() }
  pub fn params(&self) -> &SynthParams { &self.params }
  pub fn octave_shift(&self) -> i32 { self.params.octave_shift }
  pub fn status(&self) -> StatusSnapshot { self.status.snapshot() }

  pub fn sample_rate(&self) -> Option<f32> {
    match &self.output {
      Output::Device(Some(dev)) => Some(dev.sr),
      Output::Device(None) => None,
      Output::Offline { sr, .. } => Some(*sr),
    }
  }

  /// Wire the graph to its output once. Calling again is a no-op; a failure
  /// leaves the synth uninitialized so the call can be retried.
  pub fn initialize(&mut self) -> Result<(), EngineError> {
    if self.tx.is_some() { return Ok(()); }
    self.config.validate()?;
    let (tx, rx) = bounded(self.config.queue_capacity);
    match &mut self.output {
      Output::Device(slot) => {
        let mut dev = AudioEngine::open(&self.config)?;
        let graph = EngineGraph::new(dev.sr, &self.config, self.params).with_status(self.status.clone());
        dev.start(graph, rx, self.config.max_msgs_per_block)?;
        *slot = Some(dev);
      }
      Output::Offline { sr, graph } => {
        let g = EngineGraph::new(*sr, &self.config, self.params).with_status(self.status.clone());
        *graph = Some((g, rx));
      }
    }
    log::info!("synth initialized ({} voices)", self.config.max_voices);
    self.tx = Some(tx);
    Ok(())
  }

  /// Stop output and return to the uninitialized state. Parameters are kept.
  pub fn shutdown(&mut self) {
    self.tx = None;
    match &mut self.output {
      Output::Device(slot) => { if let Some(mut dev) = slot.take() { dev.stop(); } }
      Output::Offline { graph, .. } => { *graph = None; }
    }
  }

  fn send(&self, msg: EngineMsg) {
    let Some(tx) = self.tx.as_ref() else { return };
    match tx.try_send(msg) {
      Ok(()) => {}
      Err(TrySendError::Full(_)) => {
        self.status.note_dropped();
        log::warn!("engine queue full, message dropped");
      }
      Err(TrySendError::Disconnected(_)) => log::warn!("engine queue closed"),
    }
  }

  /// Keys outside the layout are ignored.
  pub fn note_on(&mut self, note: NoteId) {
    match keyboard::base_freq(note) {
      Some(f) => self.note_on_with_pitch(note, f),
      None => log::debug!("note on for unmapped {:?}", note),
    }
  }

  /// Any identity, any unshifted pitch. Octave shift still applies.
  pub fn note_on_with_pitch(&mut self, note: NoteId, base_freq: f32) {
    if !self.is_initialized() { return; }
    if !(base_freq.is_finite() && base_freq > 0.0) { return; }
    self.send(EngineMsg::NoteOn { note, freq: base_freq });
  }

  pub fn note_off(&mut self, note: NoteId) {
    if !self.is_initialized() { return; }
    self.send(EngineMsg::NoteOff { note });
  }

  /// Raw keyboard input. Auto-repeat presses are ignored.
  pub fn key_down(&mut self, key: char, repeat: bool) {
    if repeat { return; }
    match keyboard::action_for(key) {
      Some(KeyAction::Note { note, base_freq }) => self.note_on_with_pitch(note, base_freq),
      Some(KeyAction::OctaveDown) => { self.octave_down(); }
      Some(KeyAction::OctaveUp) => { self.octave_up(); }
      None => {}
    }
  }

  pub fn key_up(&mut self, key: char) {
    if let Some(KeyAction::Note { note, .. }) = keyboard::action_for(key) { self.note_off(note); }
  }

  /// Name-based write, as issued by UI controls. Returns the clamped value
  /// stored, or `None` when the name or value was not understood.
  pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> Option<Param> {
    match Param::parse(name, &value.into()) {
      Ok(p) => Some(self.set(p)),
      Err(e) => {
        log::warn!("set_parameter: {e}");
        None
      }
    }
  }

  pub fn set(&mut self, p: Param) -> Param {
    let p = self.params.apply(p);
    self.send(EngineMsg::SetParam(p));
    p
  }

  pub fn octave_up(&mut self) -> i32 { self.shift_octave(1) }
  pub fn octave_down(&mut self) -> i32 { self.shift_octave(-1) }

  fn shift_octave(&mut self, by: i32) -> i32 {
    let next = (self.params.octave_shift + by).clamp(params::OCTAVE_MIN, params::OCTAVE_MAX);
    if next != self.params.octave_shift { self.set(Param::OctaveShift(next)); }
    self.params.octave_shift
  }

  pub fn apply_preset(&mut self, preset: &Preset) {
    for p in preset.to_params().to_params() { self.set(p); }
    log::info!("preset `{}` applied", preset.name);
  }

  pub fn apply_preset_named(&mut self, name: &str) -> bool {
    match presets::find(name) {
      Some(p) => { self.apply_preset(p); true }
      None => { log::warn!("no preset named `{name}`"); false }
    }
  }

  /// Hard stop of every voice, no release. Lands in the next block even when
  /// the queue is backed up past the per-block cap, or full.
  pub fn panic(&mut self) {
    let Some(tx) = self.tx.as_ref() else { return };
    self.status.request_panic();
    if tx.try_send(EngineMsg::Panic).is_err() {
      self.status.force_panic();
      log::warn!("engine queue full, panic forced");
    }
  }

  /// Keys released while unfocused never send key-up; silence everything.
  pub fn focus_lost(&mut self) { self.panic(); }

  /// Release every held key with the normal release ramp.
  pub fn release_all(&mut self) { self.send(EngineMsg::ReleaseAll); }

  /// Read-only tap on the master output. `None` before initialization.
  pub fn attach_scope(&mut self) -> Option<ScopeReader> {
    if !self.is_initialized() { return None; }
    let (tap, reader) = scope_pair(self.config.scope_frame, self.config.scope_buffers);
    self.send(EngineMsg::AttachScope(Box::new(tap)));
    Some(reader)
  }

  /// Offline only: render `frames` interleaved stereo frames, applying queued
  /// messages at block boundaries exactly like the device callback does.
  pub fn render(&mut self, frames: usize) -> Result<Vec<f32>, EngineError> {
    let mut out = vec![0.0; frames * 2];
    self.render_into(&mut out)?;
    Ok(out)
  }

  pub fn render_into(&mut self, out: &mut [f32]) -> Result<(), EngineError> {
    let block = self.config.offline_block.max(1) * 2;
    let max_msgs = self.config.max_msgs_per_block;
    let Output::Offline { graph: Some((graph, rx)), .. } = &mut self.output else { return Err(EngineError::NotInitialized) };
    for chunk in out.chunks_mut(block) {
      graph.drain(rx, max_msgs);
      graph.process(chunk, 2);
    }
    Ok(())
  }

  /// Offline only: the render-side state, for inspection.
  pub fn graph(&self) -> Option<&EngineGraph> {
    match &self.output {
      Output::Offline { graph: Some((g, _)), .. } => Some(g),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn offline() -> Synth {
    Synth::offline(EngineConfig { offline_sample_rate: 8000, reverb_seconds: 0.25, ..EngineConfig::default() })
  }

  #[test]
  fn notes_before_initialize_are_ignored() {
    let mut s = offline();
    s.note_on(NoteId::from('a'));
    assert!(matches!(s.render(64), Err(EngineError::NotInitialized)));
    s.initialize().unwrap();
    s.render(64).unwrap();
    assert_eq!(s.graph().unwrap().voices().active_count(), 0);
  }

  #[test]
  fn initialize_is_idempotent() {
    let mut s = offline();
    s.initialize().unwrap();
    s.note_on(NoteId::from('a'));
    s.initialize().unwrap();
    s.render(64).unwrap();
    assert_eq!(s.graph().unwrap().voices().active_count(), 1);
  }

  #[test]
  fn params_set_early_reach_the_graph() {
    let mut s = offline();
    s.set_parameter("filterCutoff", 900.0f32);
    s.initialize().unwrap();
    assert_eq!(s.graph().unwrap().params().effects.filter.cutoff_hz, 900.0);
  }

  #[test]
  fn octave_keys_clamp() {
    let mut s = offline();
    for _ in 0..5 { s.key_down('x', false); }
    assert_eq!(s.octave_shift(), 2);
    for _ in 0..9 { s.octave_down(); }
    assert_eq!(s.octave_shift(), -2);
  }

  #[test]
  fn unknown_parameter_is_ignored() {
    let mut s = offline();
    assert_eq!(s.set_parameter("wobble", 1.0f32), None);
    assert_eq!(s.set_parameter("waveform", 7.5f32), None);
    assert_eq!(*s.params(), SynthParams::default());
  }

  #[test]
  fn config_errors_leave_synth_retryable() {
    let mut s = Synth::offline(EngineConfig { max_voices: 0, ..EngineConfig::default() });
    assert!(matches!(s.initialize(), Err(EngineError::Config(_))));
    assert!(!s.is_initialized());
  }
}
