use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use super::Smooth;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType { #[default] Lowpass, Highpass, Bandpass, Notch }

impl FilterType {
  pub fn from_name(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "lowpass" | "lp" => Some(Self::Lowpass),
      "highpass" | "hp" => Some(Self::Highpass),
      "bandpass" | "bp" => Some(Self::Bandpass),
      "notch" => Some(Self::Notch),
      _ => None,
    }
  }
  pub fn from_index(i: i32) -> Self {
    match i { 1 => Self::Highpass, 2 => Self::Bandpass, 3 => Self::Notch, _ => Self::Lowpass }
  }
}

#[derive(Clone)]
struct Svf {
  ic1eq: f32,
  ic2eq: f32,
  g: f32,
  k: f32,
}

impl Svf {
  fn new() -> Self { Self { ic1eq: 0.0, ic2eq: 0.0, g: 0.1, k: 0.5 } }
  fn set_params(&mut self, cutoff: f32, q: f32, sr: f32) {
    let g = (PI * (cutoff / sr)).tan();
    self.g = g;
    self.k = 1.0 / q.max(0.001);
  }
  fn process(&mut self, x: f32) -> (f32, f32, f32, f32) {
    let g = self.g; let k = self.k;
    let v0 = x;
    let v1 = (self.ic1eq + g * (v0 - self.ic2eq)) / (1.0 + g * (g + k));
    let v2 = self.ic2eq + g * v1;
    self.ic1eq = 2.0 * v1 - self.ic1eq;
    self.ic2eq = 2.0 * v2 - self.ic2eq;
    let lp = v2;
    let bp = v1;
    let hp = v0 - k * bp - lp;
    let notch = hp + lp;
    (lp, hp, bp, notch)
  }
}

/// Resonant filter stage. Cutoff and Q are smoothed per sample; coefficients
/// are refreshed every fourth sample when they moved.
pub struct ResonantFilter {
  sr: f32,
  svf: Svf,
  cutoff: Smooth,
  q: Smooth,
  last_fc: f32,
  last_q: f32,
  upd_phase: u8,
}

impl ResonantFilter {
  pub fn new(sr: f32, cutoff_hz: f32, q: f32) -> Self {
    let mut f = Self { sr, svf: Svf::new(), cutoff: Smooth::with_value(sr, 10.0, cutoff_hz), q: Smooth::with_value(sr, 10.0, q), last_fc: -1.0, last_q: -1.0, upd_phase: 0 };
    f.refresh(cutoff_hz, q);
    f
  }

  /// Highest cutoff the SVF stays stable at for this sample rate.
  pub fn max_cutoff(&self) -> f32 { 0.49 * self.sr }

  fn refresh(&mut self, fc: f32, q: f32) {
    if (fc - self.last_fc).abs() > 1e-3 || (q - self.last_q).abs() > 1e-3 {
      self.svf.set_params(fc, q, self.sr);
      self.last_fc = fc; self.last_q = q;
    }
  }

  /// `mod_hz` is summed onto the smoothed cutoff before clamping.
  #[inline]
  pub fn process(&mut self, x: f32, kind: FilterType, cutoff_hz: f32, q: f32, mod_hz: f32) -> f32 {
    let fc = (self.cutoff.next(cutoff_hz) + mod_hz).clamp(20.0, self.max_cutoff());
    let q = self.q.next(q);
    if self.upd_phase & 3 == 0 { self.refresh(fc, q); }
    self.upd_phase = self.upd_phase.wrapping_add(1);
    let (lp, hp, bp, nt) = self.svf.process(x);
    match kind { FilterType::Lowpass => lp, FilterType::Highpass => hp, FilterType::Bandpass => bp, FilterType::Notch => nt }
  }
}
