//! Fixed voice pool plus the key -> voice bindings that drive the
//! trigger / retrigger / release state machine.
//!
//! Slots are allocated once. A voice leaves its slot only when its scheduled
//! stop time has passed (checked at block start by [`VoiceManager::maintain`])
//! or when it is stolen or hard-stopped. The bindings map is reserved up front
//! and never grows past the pool size.

use std::collections::HashMap;

use crate::engine::envelope::{self, EnvelopeSpec, Schedule};
use crate::engine::voice::{NoteId, Voice, VoiceError, VoiceStage, Waveform};

/// Tail after a release ramp before the oscillator is stopped.
pub const RELEASE_MARGIN_S: f64 = 0.1;
/// Forced fade applied to the old voice on retrigger.
pub const RETRIGGER_FADE_S: f64 = 0.03;
/// The old voice is stopped this long after a retrigger.
pub const RETRIGGER_STOP_S: f64 = 0.05;
/// A retriggered key is rebound to its new voice after this window.
pub const HANDOFF_WINDOW_S: f64 = 0.03;

/// Everything needed to start a voice, resolved on the render thread at note-on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteRequest {
  pub waveform: Waveform,
  pub freq: f32,
  pub env: EnvelopeSpec,
  pub pitch_tap: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Binding {
  /// Key is down; its voice is live.
  Held { slot: usize, id: u64 },
  /// Key was re-pressed; the new voice takes over the key at `commit_at`.
  Handoff { slot: usize, id: u64, commit_at: f64, req: NoteRequest },
  /// Key is up; the voice rings out and may still be retriggered.
  Releasing { slot: usize, id: u64 },
}

impl Binding {
  fn target(&self) -> (usize, u64) {
    match *self {
      Binding::Held { slot, id } | Binding::Handoff { slot, id, .. } | Binding::Releasing { slot, id } => (slot, id),
    }
  }
}

pub struct VoiceManager {
  sr: f32,
  slots: Vec<Option<Voice>>,
  bindings: HashMap<NoteId, Binding>,
  next_id: u64,
  scratch: Vec<NoteId>,
}

impl VoiceManager {
  pub fn new(sr: f32, max_voices: usize) -> Self {
    let max_voices = max_voices.max(1);
    Self {
      sr,
      slots: (0..max_voices).map(|_| None).collect(),
      bindings: HashMap::with_capacity(max_voices * 2),
      next_id: 1,
      scratch: Vec::with_capacity(max_voices * 2),
    }
  }

  pub fn capacity(&self) -> usize { self.slots.len() }

  pub fn note_on(&mut self, note: NoteId, req: NoteRequest, now: f64) {
    let prev = self.bindings.get(&note).copied();
    let Some(prev) = prev else { self.trigger_full(note, req, now); return; };
    let (slot, id) = prev.target();
    if let Err(e) = self.force_retire(slot, id, now) {
      // Nothing left to hand off from; start clean.
      log::debug!("retrigger {:?}: {e}, full trigger", note);
      self.trigger_full(note, req, now);
      return;
    }
    let sched = envelope::compute_quick_attack(&req.env, now);
    match self.spawn(note, &req, sched) {
      Some((slot, id)) => { self.bindings.insert(note, Binding::Handoff { slot, id, commit_at: now + HANDOFF_WINDOW_S, req }); }
      None => { self.bindings.remove(&note); }
    }
  }

  fn trigger_full(&mut self, note: NoteId, req: NoteRequest, now: f64) {
    let sched = envelope::compute_envelope(&req.env, now);
    match self.spawn(note, &req, sched) {
      Some((slot, id)) => { self.bindings.insert(note, Binding::Held { slot, id }); }
      None => { self.bindings.remove(&note); }
    }
  }

  /// Short fade and early stop for a voice being replaced by a retrigger.
  fn force_retire(&mut self, slot: usize, id: u64, now: f64) -> Result<(), VoiceError> {
    let v = self.voice_mut(slot, id)?;
    v.release(now, RETRIGGER_FADE_S)?;
    v.schedule_stop(now + RETRIGGER_STOP_S)?;
    v.mark_retiring();
    Ok(())
  }

  pub fn note_off(&mut self, note: NoteId, now: f64, release_time: f64) {
    let Some(b) = self.bindings.get(&note).copied() else { return };
    if matches!(b, Binding::Releasing { .. }) { return; }
    let (slot, id) = b.target();
    let released = self.voice_mut(slot, id).and_then(|v| {
      v.release(now, release_time)?;
      v.schedule_stop(now + envelope::clamp_duration(release_time) + RELEASE_MARGIN_S)?;
      v.mark_retiring();
      Ok(())
    });
    match released {
      Ok(()) => { self.bindings.insert(note, Binding::Releasing { slot, id }); }
      Err(e) => {
        log::debug!("note off {:?}: {e}", note);
        self.bindings.remove(&note);
      }
    }
  }

  /// Release every key that is still down.
  pub fn release_all(&mut self, now: f64, release_time: f64) {
    let mut keys = std::mem::take(&mut self.scratch);
    keys.clear();
    keys.extend(self.bindings.iter().filter(|(_, b)| !matches!(b, Binding::Releasing { .. })).map(|(n, _)| *n));
    for &n in &keys { self.note_off(n, now, release_time); }
    self.scratch = keys;
  }

  /// Silence everything now, no ramps, and forget every binding.
  pub fn panic(&mut self, now: f64) {
    for slot in self.slots.iter_mut() {
      if let Some(v) = slot.as_mut() {
        if let Err(e) = v.hard_stop(now) { log::debug!("panic: {e}"); }
      }
      *slot = None;
    }
    self.bindings.clear();
  }

  /// Block-start bookkeeping: free finished voices, then settle bindings.
  pub fn maintain(&mut self, now: f64) {
    for slot in self.slots.iter_mut() {
      if slot.as_ref().is_some_and(|v| v.is_finished(now)) { *slot = None; }
    }
    let mut keys = std::mem::take(&mut self.scratch);
    keys.clear();
    keys.extend(self.bindings.keys().copied());
    for &note in &keys {
      let Some(b) = self.bindings.get(&note).copied() else { continue };
      let (slot, id) = b.target();
      let alive = self.holds(slot, id);
      match b {
        Binding::Handoff { commit_at, req, .. } if now >= commit_at => {
          if alive {
            self.bindings.insert(note, Binding::Held { slot, id });
          } else {
            log::warn!("handoff for {:?} lost its voice, retriggering", note);
            self.trigger_full(note, req, now);
          }
        }
        Binding::Handoff { .. } => {}
        Binding::Held { .. } | Binding::Releasing { .. } => {
          if !alive { self.bindings.remove(&note); }
        }
      }
    }
    self.scratch = keys;
  }

  fn spawn(&mut self, note: NoteId, req: &NoteRequest, sched: Schedule) -> Option<(usize, u64)> {
    let slot = match self.slots.iter().position(Option::is_none) {
      Some(i) => i,
      None => {
        let i = self.steal_candidate()?;
        log::debug!("voice pool full, stealing slot {i}");
        i
      }
    };
    let id = self.next_id;
    self.next_id += 1;
    self.slots[slot] = Some(Voice::new(id, note, req.waveform, req.freq, req.env, sched, self.sr, req.pitch_tap));
    Some((slot, id))
  }

  /// Retiring voice closest to its stop, else the oldest active voice.
  fn steal_candidate(&self) -> Option<usize> {
    let live = self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|v| (i, v)));
    let retiring = live.clone()
      .filter(|(_, v)| v.is_retiring())
      .min_by(|a, b| a.1.stop_time().unwrap_or(f64::MAX).total_cmp(&b.1.stop_time().unwrap_or(f64::MAX)));
    retiring
      .or_else(|| live.min_by(|a, b| a.1.start_time.total_cmp(&b.1.start_time).then(a.1.id.cmp(&b.1.id))))
      .map(|(i, _)| i)
  }

  fn holds(&self, slot: usize, id: u64) -> bool {
    matches!(self.slots.get(slot), Some(Some(v)) if v.id == id)
  }

  fn voice_mut(&mut self, slot: usize, id: u64) -> Result<&mut Voice, VoiceError> {
    match self.slots.get_mut(slot) {
      Some(Some(v)) if v.id == id => Ok(v),
      _ => Err(VoiceError::StaleSlot { slot, id }),
    }
  }

  /// Sum of every sounding voice at time `t`.
  #[inline]
  pub fn render(&mut self, t: f64, lfo: f32) -> f32 {
    let mut acc = 0.0;
    for v in self.slots.iter_mut().flatten() { acc += v.next(t, lfo); }
    acc
  }

  pub fn voices(&self) -> impl Iterator<Item = &Voice> { self.slots.iter().flatten() }
  pub fn active_count(&self) -> usize { self.voices().filter(|v| !v.is_retiring()).count() }
  pub fn retiring_count(&self) -> usize { self.voices().filter(|v| v.is_retiring()).count() }
  pub fn is_silent(&self) -> bool { self.slots.iter().all(Option::is_none) }

  /// The voice a key currently points at (the incoming one during a handoff).
  pub fn bound_voice(&self, note: NoteId) -> Option<&Voice> {
    let (slot, id) = self.bindings.get(&note)?.target();
    self.slots.get(slot)?.as_ref().filter(|v| v.id == id)
  }

  pub fn in_handoff(&self, note: NoteId) -> bool { matches!(self.bindings.get(&note), Some(Binding::Handoff { .. })) }

  /// `None` once the key no longer tracks any voice.
  pub fn stage_of(&self, note: NoteId, now: f64) -> Option<VoiceStage> {
    self.bound_voice(note).map(|v| v.stage(now))
  }

  pub fn level_of(&self, note: NoteId, now: f64) -> f32 {
    self.bound_voice(note).map_or(0.0, |v| v.level_at(now))
  }

  /// Combined envelope level of every voice playing `note`.
  pub fn note_level(&self, note: NoteId, now: f64) -> f32 {
    self.voices().filter(|v| v.note == note).map(|v| v.level_at(now)).sum()
  }
}
