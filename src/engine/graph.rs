use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::config::EngineConfig;
use crate::engine::dsp::Smooth;
use crate::engine::effects::EffectsChain;
use crate::engine::messages::EngineMsg;
use crate::engine::modulation::Lfo;
use crate::engine::params::{Param, SynthParams};
use crate::engine::state::{EngineStatus, ScopeTap};
use crate::engine::voice::NoteId;
use crate::engine::voice_manager::{NoteRequest, VoiceManager};

#[inline]
fn soft_clip(x: f32) -> f32 { (x.tanh()).clamp(-1.0, 1.0) }

/// Everything the render thread owns. Built on the control thread, then moved
/// into the audio callback (or driven directly for offline rendering).
pub struct EngineGraph {
  pub sr: f32,
  frames: u64,
  voices: VoiceManager,
  fx: EffectsChain,
  lfo: Lfo,
  params: SynthParams,
  master: Smooth,
  scope: Option<Box<ScopeTap>>,
  status: Option<Arc<EngineStatus>>,
  panics_seen: u64,
}

impl EngineGraph {
  pub fn new(sr: f32, config: &EngineConfig, params: SynthParams) -> Self {
    let mut g = Self {
      sr,
      frames: 0,
      voices: VoiceManager::new(sr, config.max_voices),
      fx: EffectsChain::new(sr, params.effects, config.reverb_seconds),
      lfo: Lfo::new(sr),
      params: SynthParams::default(),
      master: Smooth::with_value(sr, 20.0, params.volume),
      scope: None,
      status: None,
      panics_seen: 0,
    };
    for p in params.to_params() { g.apply_param(p); }
    g.params.octave_shift = params.octave_shift;
    g
  }

  /// Panics requested before this graph existed belong to an older queue.
  pub fn with_status(mut self, status: Arc<EngineStatus>) -> Self {
    self.panics_seen = status.panics_queued();
    self.status = Some(status);
    self
  }

  /// Render clock in seconds.
  #[inline]
  pub fn now(&self) -> f64 { self.frames as f64 / self.sr as f64 }
  pub fn frames(&self) -> u64 { self.frames }
  pub fn params(&self) -> &SynthParams { &self.params }
  pub fn voices(&self) -> &VoiceManager { &self.voices }
  pub fn lfo(&self) -> &Lfo { &self.lfo }

  /// Apply at most `max` queued messages; never blocks. A pending panic lifts
  /// the cap until the `Panic` message itself has been applied, and a panic
  /// that never made it into the queue runs after everything queued.
  pub fn drain(&mut self, rx: &Receiver<EngineMsg>, max: usize) -> usize {
    let (owed, forced) = match self.status.as_deref() {
      Some(s) => (s.panics_queued(), s.take_forced_panic()),
      None => (0, false),
    };
    let mut n = 0usize;
    while n < max || self.panics_seen < owed || forced {
      match rx.try_recv() {
        Ok(msg) => self.apply_msg(msg),
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
      }
      n += 1;
    }
    if forced { self.voices.panic(self.now()); }
    n
  }

  pub fn apply_msg(&mut self, msg: EngineMsg) {
    let now = self.now();
    match msg {
      EngineMsg::NoteOn { note, freq } => self.note_on(note, freq),
      EngineMsg::NoteOff { note } => self.voices.note_off(note, now, self.params.envelope.release_time as f64),
      EngineMsg::SetParam(p) => self.apply_param(p),
      EngineMsg::ReleaseAll => self.voices.release_all(now, self.params.envelope.release_time as f64),
      EngineMsg::Panic => {
        self.panics_seen += 1;
        self.voices.panic(now);
      }
      EngineMsg::AttachScope(tap) => self.scope = Some(tap),
    }
  }

  /// `base_freq` is the unshifted key pitch; octave, waveform, envelope and
  /// pitch routing are all read here, at trigger time.
  fn note_on(&mut self, note: NoteId, base_freq: f32) {
    let p = &self.params;
    let freq = base_freq * 2f32.powi(p.octave_shift);
    let req = NoteRequest { waveform: p.waveform, freq, env: p.envelope_spec(), pitch_tap: self.lfo.pitch_tap_for(freq) };
    let now = self.now();
    self.voices.note_on(note, req, now);
  }

  pub fn apply_param(&mut self, p: Param) {
    let p = self.params.apply(p);
    match p {
      Param::FilterType(_) | Param::FilterCutoff(_) | Param::FilterResonance(_)
      | Param::DelayTime(_) | Param::DelayFeedback(_) | Param::DelayMix(_) | Param::ReverbWet(_) => self.fx.set_state(self.params.effects),
      Param::LfoEnabled(on) => self.lfo.set_enabled(on),
      Param::LfoRate(hz) => self.lfo.set_rate(hz),
      Param::LfoDepth(d) => self.lfo.set_depth(d),
      Param::LfoTarget(route) => self.lfo.set_route(route),
      // read at the next trigger (volume also feeds the master gain per sample)
      Param::Waveform(_) | Param::Volume(_) | Param::EnvelopeMode(_) | Param::Attack(_) | Param::Decay(_)
      | Param::Sustain(_) | Param::Release(_) | Param::OctaveShift(_) => {}
    }
  }

  #[inline]
  pub fn render_frame(&mut self) -> (f32, f32) {
    let t = self.now();
    let lfo = self.lfo.tick();
    let x = self.voices.render(t, lfo.signal);
    let (l, r) = self.fx.process(x, lfo.cutoff_offset);
    let g = self.master.next(self.params.volume);
    let (l, r) = (soft_clip(l * g), soft_clip(r * g));
    if let Some(tap) = self.scope.as_mut() { tap.push(l, r); }
    self.frames += 1;
    (l, r)
  }

  /// Fill an interleaved buffer. Voice bookkeeping runs once, at block start.
  pub fn process(&mut self, out: &mut [f32], channels: usize) {
    let channels = channels.max(1);
    self.voices.maintain(self.now());
    for frame in out.chunks_mut(channels) {
      let (l, r) = self.render_frame();
      match frame.len() {
        1 => frame[0] = 0.5 * (l + r),
        _ => {
          frame[0] = l;
          frame[1] = r;
          frame[2..].iter_mut().for_each(|s| *s = 0.0);
        }
      }
    }
    if self.scope.as_ref().is_some_and(|t| t.is_closed()) { self.scope = None; }
    if let Some(s) = self.status.as_ref() {
      s.publish(self.voices.active_count(), self.voices.retiring_count(), self.frames);
    }
  }
}
