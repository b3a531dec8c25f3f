//! Amplitude envelopes expressed as time-stamped breakpoint schedules.
//!
//! A schedule is evaluated against the render clock (seconds). Replacing a
//! voice's schedule is a single value assignment, so a release can never be
//! half-applied on top of a pending attack/decay.

use serde::{Deserialize, Serialize};

/// Shortest ramp the generator will emit. A zero-length ramp is a click.
pub const MIN_RAMP_S: f64 = 0.001;
/// Upper bound for the retrigger attack.
pub const QUICK_ATTACK_S: f64 = 0.05;

const MAX_POINTS: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeMode {
  /// Two-stage: attack to peak, hold until release.
  Ar,
  /// Four-stage: attack, decay to sustain, hold, release.
  #[default]
  Adsr,
}

impl EnvelopeMode {
  pub fn from_name(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() { "ar" => Some(Self::Ar), "adsr" => Some(Self::Adsr), _ => None }
  }
}

/// Per-note snapshot of the envelope settings, copied into a voice at trigger time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeSpec {
  pub mode: EnvelopeMode,
  pub attack: f64,
  pub decay: f64,
  pub sustain: f32,
  pub release: f64,
  pub peak: f32,
}

impl EnvelopeSpec {
  /// Level the envelope rests at once attack (and decay) have run.
  pub fn hold_level(&self) -> f32 {
    match self.mode {
      EnvelopeMode::Ar => self.peak,
      EnvelopeMode::Adsr => self.peak * self.sustain.clamp(0.0, 1.0),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Breakpoint { t: f64, v: f32 }

/// Piecewise-linear curve. Before the first breakpoint it holds the first
/// value, after the last it holds the last value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Schedule {
  points: [Breakpoint; MAX_POINTS],
  len: usize,
}

impl Schedule {
  /// Constant level from `t` on.
  pub fn hold(t: f64, v: f32) -> Self {
    let mut s = Self { points: [Breakpoint { t, v }; MAX_POINTS], len: 0 };
    s.push(t, v);
    s
  }

  fn push(&mut self, t: f64, v: f32) {
    debug_assert!(self.len < MAX_POINTS);
    if self.len < MAX_POINTS { self.points[self.len] = Breakpoint { t, v }; self.len += 1; }
  }

  /// Append a linear ramp that reaches `v` after `dur` seconds (clamped to [`MIN_RAMP_S`]).
  fn ramp(mut self, dur: f64, v: f32) -> Self {
    let last = self.points[self.len - 1].t;
    self.push(last + clamp_duration(dur), v);
    self
  }

  pub fn value_at(&self, t: f64) -> f32 {
    let pts = &self.points[..self.len];
    if t <= pts[0].t { return pts[0].v; }
    for w in pts.windows(2) {
      let (a, b) = (w[0], w[1]);
      if t < b.t {
        let frac = ((t - a.t) / (b.t - a.t)) as f32;
        return a.v + (b.v - a.v) * frac;
      }
    }
    pts[self.len - 1].v
  }

  pub fn start_time(&self) -> f64 { self.points[0].t }
  pub fn end_time(&self) -> f64 { self.points[self.len - 1].t }
  /// Level the curve settles at after its last breakpoint.
  pub fn final_value(&self) -> f32 { self.points[self.len - 1].v }
  pub fn is_settled(&self, t: f64) -> bool { t >= self.end_time() }
}

#[inline]
pub fn clamp_duration(d: f64) -> f64 { if d.is_finite() { d.max(MIN_RAMP_S) } else { MIN_RAMP_S } }

/// Attack (and decay for ADSR) starting at `start`; sustain is implicit.
pub fn compute_envelope(spec: &EnvelopeSpec, start: f64) -> Schedule {
  let s = Schedule::hold(start, 0.0).ramp(spec.attack, spec.peak);
  match spec.mode {
    EnvelopeMode::Ar => s,
    EnvelopeMode::Adsr => s.ramp(spec.decay, spec.hold_level()),
  }
}

/// Retrigger variant: straight to the hold level over min(attack, 50 ms).
pub fn compute_quick_attack(spec: &EnvelopeSpec, start: f64) -> Schedule {
  Schedule::hold(start, 0.0).ramp(spec.attack.min(QUICK_ATTACK_S), spec.hold_level())
}

/// Ramp from the live level to silence. Callers pass the value the current
/// schedule produces at `now`, never a stored target.
pub fn release(current_level: f32, now: f64, release_time: f64) -> Schedule {
  Schedule::hold(now, current_level.max(0.0)).ramp(release_time, 0.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn adsr() -> EnvelopeSpec {
    EnvelopeSpec { mode: EnvelopeMode::Adsr, attack: 0.1, decay: 0.2, sustain: 0.7, release: 0.3, peak: 0.5 }
  }

  #[test]
  fn adsr_reaches_peak_then_sustain() {
    let s = compute_envelope(&adsr(), 1.0);
    assert_eq!(s.value_at(1.0), 0.0);
    assert!((s.value_at(1.05) - 0.25).abs() < 1e-4);
    assert!((s.value_at(1.1) - 0.5).abs() < 1e-4);
    assert!((s.value_at(1.3) - 0.35).abs() < 1e-4);
    assert!((s.value_at(60.0) - 0.35).abs() < 1e-6);
    assert!((s.end_time() - 1.3).abs() < 1e-9);
  }

  #[test]
  fn ar_holds_at_peak() {
    let spec = EnvelopeSpec { mode: EnvelopeMode::Ar, ..adsr() };
    let s = compute_envelope(&spec, 0.0);
    assert!((s.value_at(0.1) - 0.5).abs() < 1e-4);
    assert!((s.value_at(5.0) - 0.5).abs() < 1e-6);
  }

  #[test]
  fn release_starts_from_live_level_mid_attack() {
    let s = compute_envelope(&adsr(), 0.0);
    let live = s.value_at(0.04);
    let r = release(live, 0.04, 0.3);
    assert!((r.value_at(0.04) - live).abs() < 1e-6);
    assert!((r.value_at(0.19) - live * 0.5).abs() < 1e-4);
    assert_eq!(r.value_at(0.34), 0.0);
    assert_eq!(r.value_at(1.0), 0.0);
  }

  #[test]
  fn zero_durations_are_clamped() {
    let spec = EnvelopeSpec { attack: 0.0, decay: -1.0, release: f64::NAN, ..adsr() };
    let s = compute_envelope(&spec, 0.0);
    assert!(s.end_time() >= 2.0 * MIN_RAMP_S - 1e-12);
    assert_eq!(s.value_at(0.0), 0.0);
    let r = release(0.4, 1.0, spec.release);
    assert!((r.end_time() - (1.0 + MIN_RAMP_S)).abs() < 1e-12);
  }

  #[test]
  fn quick_attack_is_capped() {
    let spec = EnvelopeSpec { attack: 0.8, ..adsr() };
    let s = compute_quick_attack(&spec, 2.0);
    assert!((s.end_time() - 2.05).abs() < 1e-9);
    assert!((s.final_value() - 0.35).abs() < 1e-6);
    let fast = EnvelopeSpec { attack: 0.01, ..adsr() };
    assert!((compute_quick_attack(&fast, 0.0).end_time() - 0.01).abs() < 1e-9);
  }
}
