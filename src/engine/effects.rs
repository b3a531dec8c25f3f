//! The shared post-voice chain: filter, feedback delay, convolution reverb.

use crate::engine::dsp::delay::SimpleDelay;
use crate::engine::dsp::filter::ResonantFilter;
use crate::engine::dsp::reverb::ConvolutionReverb;
use crate::engine::params::{self, EffectsState};

const DELAY_MAX_MS: f32 = 1200.0;

pub struct EffectsChain {
  sr: f32,
  filter: ResonantFilter,
  delay: SimpleDelay,
  reverb: ConvolutionReverb,
  state: EffectsState,
}

impl EffectsChain {
  pub fn new(sr: f32, state: EffectsState, reverb_seconds: f32) -> Self {
    let f = &state.filter; let d = &state.delay;
    Self {
      sr,
      filter: ResonantFilter::new(sr, f.cutoff_hz, f.resonance),
      delay: SimpleDelay::new(DELAY_MAX_MS, sr, d.time_s, d.feedback, d.mix),
      reverb: ConvolutionReverb::new(sr, reverb_seconds, state.reverb.wet),
      state,
    }
  }

  pub fn state(&self) -> &EffectsState { &self.state }

  /// Takes effect from the next sample on; smoothing happens inside each stage.
  pub fn set_state(&mut self, state: EffectsState) {
    let mut s = state;
    s.filter.cutoff_hz = params::CUTOFF.clamp(s.filter.cutoff_hz);
    s.filter.resonance = params::RESONANCE.clamp(s.filter.resonance);
    s.delay.time_s = params::DELAY_TIME.clamp(s.delay.time_s);
    s.delay.feedback = params::DELAY_FEEDBACK.clamp(s.delay.feedback);
    s.delay.mix = params::DELAY_MIX.clamp(s.delay.mix);
    s.reverb.wet = params::REVERB_WET.clamp(s.reverb.wet);
    self.state = s;
  }

  /// Mono voice sum in, stereo out. `cutoff_offset` is the LFO's filter route.
  #[inline]
  pub fn process(&mut self, x: f32, cutoff_offset: f32) -> (f32, f32) {
    let s = &self.state;
    let y = self.filter.process(x, s.filter.kind, s.filter.cutoff_hz, s.filter.resonance, cutoff_offset);
    let y = self.delay.process(y, self.sr, s.delay.time_s, s.delay.feedback, s.delay.mix);
    self.reverb.process(y, s.reverb.wet)
  }
}
