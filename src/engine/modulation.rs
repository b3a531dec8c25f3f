use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::engine::dsp::Smooth;

/// Fraction of a note's frequency the pitch tap swings at full LFO output.
pub const PITCH_TAP_RATIO: f32 = 0.05;

/// Where the LFO is routed. Switched by plain assignment from the render thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModRoute {
  #[default]
  #[serde(alias = "filterCutoff", alias = "cutoff")]
  Filter,
  Pitch,
}

impl ModRoute {
  pub fn from_name(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "filter" | "filtercutoff" | "cutoff" => Some(Self::Filter),
      "pitch" => Some(Self::Pitch),
      _ => None,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LfoFrame {
  /// Gated sine in [-1, 1]; zero while disabled.
  pub signal: f32,
  /// Hz added to the filter cutoff, zero unless the shared route is the filter.
  pub cutoff_offset: f32,
}

pub struct Lfo {
  sr: f32,
  phase: f32,
  rate_hz: f32,
  depth: f32,
  enabled: bool,
  route: ModRoute,
  // The only persistent connection an LFO can hold; pitch taps live on voices.
  shared: Option<ModRoute>,
  gate: Smooth,
  depth_s: Smooth,
}

impl Lfo {
  pub fn new(sr: f32) -> Self {
    let mut lfo = Self { sr, phase: 0.0, rate_hz: 5.0, depth: 5.0, enabled: false, route: ModRoute::Filter, shared: None, gate: Smooth::new(sr, 10.0), depth_s: Smooth::new(sr, 10.0) };
    lfo.connect(ModRoute::Filter);
    lfo.depth_s.y = lfo.depth;
    lfo
  }

  pub fn set_rate(&mut self, hz: f32) { self.rate_hz = hz; }
  pub fn set_depth(&mut self, depth: f32) { self.depth = depth; }
  /// The oscillator keeps running; only the output gate closes.
  pub fn set_enabled(&mut self, on: bool) { self.enabled = on; }
  pub fn enabled(&self) -> bool { self.enabled }
  pub fn route(&self) -> ModRoute { self.route }
  pub fn shared_route(&self) -> Option<ModRoute> { self.shared }

  pub fn set_route(&mut self, route: ModRoute) {
    if route == self.route { return; }
    self.disconnect();
    self.route = route;
    self.connect(route);
  }

  fn disconnect(&mut self) {
    if self.shared.take().is_none() { log::debug!("lfo: no previous connection to disconnect"); }
  }

  fn connect(&mut self, route: ModRoute) {
    // Pitch modulation is wired per voice at trigger time, not here.
    if route == ModRoute::Filter { self.shared = Some(ModRoute::Filter); }
  }

  /// Per-voice pitch tap for a note triggered now, if pitch modulation is live.
  /// The swing is a fixed ±5 % of the note; `depth` is in Hz and only scales
  /// the filter route.
  pub fn pitch_tap_for(&self, freq: f32) -> Option<f32> {
    (self.enabled && self.route == ModRoute::Pitch).then_some(freq * PITCH_TAP_RATIO)
  }

  #[inline]
  pub fn tick(&mut self) -> LfoFrame {
    let s = (TAU * self.phase).sin();
    self.phase = (self.phase + self.rate_hz / self.sr).fract();
    let signal = s * self.gate.next(if self.enabled { 1.0 } else { 0.0 });
    let depth = self.depth_s.next(self.depth);
    let cutoff_offset = if self.shared == Some(ModRoute::Filter) { signal * depth } else { 0.0 };
    LfoFrame { signal, cutoff_offset }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn disabled_lfo_is_silent_but_running() {
    let mut lfo = Lfo::new(1000.0);
    lfo.set_rate(10.0);
    for _ in 0..50 { assert_eq!(lfo.tick().signal, 0.0); }
    lfo.set_enabled(true);
    let peak = (0..2000).map(|_| lfo.tick().signal.abs()).fold(0.0f32, f32::max);
    assert!(peak > 0.9);
  }

  #[test]
  fn switching_route_moves_the_shared_connection() {
    let mut lfo = Lfo::new(1000.0);
    assert_eq!(lfo.shared_route(), Some(ModRoute::Filter));
    lfo.set_route(ModRoute::Pitch);
    assert_eq!(lfo.shared_route(), None);
    lfo.set_enabled(true);
    for _ in 0..500 { assert_eq!(lfo.tick().cutoff_offset, 0.0); }
    lfo.set_route(ModRoute::Pitch);
    lfo.set_route(ModRoute::Filter);
    assert_eq!(lfo.shared_route(), Some(ModRoute::Filter));
  }

  #[test]
  fn pitch_tap_only_when_enabled_and_routed() {
    let mut lfo = Lfo::new(1000.0);
    assert_eq!(lfo.pitch_tap_for(440.0), None);
    lfo.set_route(ModRoute::Pitch);
    assert_eq!(lfo.pitch_tap_for(440.0), None);
    lfo.set_enabled(true);
    assert!((lfo.pitch_tap_for(440.0).unwrap() - 22.0).abs() < 1e-4);
  }

  #[test]
  fn pitch_tap_ignores_depth() {
    let mut lfo = Lfo::new(1000.0);
    lfo.set_route(ModRoute::Pitch);
    lfo.set_enabled(true);
    let before = lfo.pitch_tap_for(440.0);
    lfo.set_depth(2000.0);
    assert_eq!(lfo.pitch_tap_for(440.0), before);
  }

  #[test]
  fn route_names_parse() {
    assert_eq!(ModRoute::from_name("filterCutoff"), Some(ModRoute::Filter));
    assert_eq!(ModRoute::from_name("PITCH"), Some(ModRoute::Pitch));
    assert_eq!(ModRoute::from_name("amp"), None);
  }
}
