use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Render-side counters published once per block for the control thread.
#[derive(Default)]
pub struct EngineStatus {
  active: AtomicUsize,
  retiring: AtomicUsize,
  frames: AtomicU64,
  dropped_msgs: AtomicU64,
  panics_queued: AtomicU64,
  panic_forced: AtomicBool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
  pub active_voices: usize,
  pub retiring_voices: usize,
  pub frames_rendered: u64,
  pub dropped_msgs: u64,
}

impl EngineStatus {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  pub fn publish(&self, active: usize, retiring: usize, frames: u64) {
    self.active.store(active, Ordering::Relaxed);
    self.retiring.store(retiring, Ordering::Relaxed);
    self.frames.store(frames, Ordering::Relaxed);
  }

  pub fn note_dropped(&self) { self.dropped_msgs.fetch_add(1, Ordering::Relaxed); }

  /// Counted before the `Panic` message is queued, so the render side knows to
  /// drain past its per-block cap until it reaches it.
  pub fn request_panic(&self) { self.panics_queued.fetch_add(1, Ordering::AcqRel); }

  /// The `Panic` message could not be queued: take back the request and have
  /// the next block panic after draining whatever is queued.
  pub fn force_panic(&self) {
    self.panics_queued.fetch_sub(1, Ordering::AcqRel);
    self.panic_forced.store(true, Ordering::Release);
  }

  pub fn panics_queued(&self) -> u64 { self.panics_queued.load(Ordering::Acquire) }
  pub fn take_forced_panic(&self) -> bool { self.panic_forced.swap(false, Ordering::AcqRel) }

  pub fn snapshot(&self) -> StatusSnapshot {
    StatusSnapshot {
      active_voices: self.active.load(Ordering::Relaxed),
      retiring_voices: self.retiring.load(Ordering::Relaxed),
      frames_rendered: self.frames.load(Ordering::Relaxed),
      dropped_msgs: self.dropped_msgs.load(Ordering::Relaxed),
    }
  }
}

/// Read-only tap on the master output. Frames travel to the reader in
/// preallocated buffers that the reader hands back after use, so the render
/// thread never allocates. A frame is skipped when no buffer is free.
pub struct ScopeTap {
  cur: Option<Vec<f32>>,
  frame_len: usize,
  filled: Sender<Vec<f32>>,
  free: Receiver<Vec<f32>>,
  closed: bool,
}

pub struct ScopeReader {
  filled: Receiver<Vec<f32>>,
  free: Sender<Vec<f32>>,
}

/// `buffers` frames of `frame_len` samples are allocated here, once.
pub fn scope_pair(frame_len: usize, buffers: usize) -> (ScopeTap, ScopeReader) {
  let buffers = buffers.max(2);
  let frame_len = frame_len.max(1);
  let (filled_tx, filled_rx) = bounded(buffers);
  let (free_tx, free_rx) = bounded(buffers);
  for _ in 0..buffers {
    let _ = free_tx.try_send(Vec::with_capacity(frame_len));
  }
  (
    ScopeTap { cur: None, frame_len, filled: filled_tx, free: free_rx, closed: false },
    ScopeReader { filled: filled_rx, free: free_tx },
  )
}

impl ScopeTap {
  pub fn is_closed(&self) -> bool { self.closed }

  #[inline]
  pub fn push(&mut self, l: f32, r: f32) {
    if self.closed { return; }
    if self.cur.is_none() {
      self.cur = self.free.try_recv().ok().map(|mut b| { b.clear(); b });
    }
    let Some(buf) = self.cur.as_mut() else { return };
    buf.push(0.5 * (l + r));
    if buf.len() < self.frame_len { return; }
    if let Some(full) = self.cur.take() {
      match self.filled.try_send(full) {
        Ok(()) => {}
        // reader is behind; reuse the buffer for the next frame
        Err(TrySendError::Full(b)) => self.cur = Some(b),
        Err(TrySendError::Disconnected(b)) => { self.cur = Some(b); self.closed = true; }
      }
    }
  }
}

impl ScopeReader {
  /// Copy the newest complete frame into `out`, discarding older ones.
  /// Returns false when nothing new has arrived.
  pub fn latest_into(&self, out: &mut Vec<f32>) -> bool {
    let mut newest = None;
    while let Ok(buf) = self.filled.try_recv() {
      if let Some(old) = newest.replace(buf) { let _ = self.free.try_send(old); }
    }
    match newest {
      Some(buf) => {
        out.clear();
        out.extend_from_slice(&buf);
        let _ = self.free.try_send(buf);
        true
      }
      None => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tap_delivers_mono_frames_and_recycles() {
    let (mut tap, reader) = scope_pair(4, 2);
    let mut out = Vec::new();
    assert!(!reader.latest_into(&mut out));
    for i in 0..4 { tap.push(i as f32, i as f32 + 2.0); }
    assert!(reader.latest_into(&mut out));
    assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    for _ in 0..100 { tap.push(0.5, 0.5); }
    assert!(reader.latest_into(&mut out));
    assert_eq!(out, vec![0.5; 4]);
  }

  #[test]
  fn tap_closes_when_reader_is_dropped() {
    let (mut tap, reader) = scope_pair(2, 2);
    drop(reader);
    for _ in 0..8 { tap.push(0.1, 0.1); }
    assert!(tap.is_closed());
  }

  #[test]
  fn status_round_trips() {
    let s = EngineStatus::new();
    s.publish(3, 1, 512);
    s.note_dropped();
    assert_eq!(s.snapshot(), StatusSnapshot { active_voices: 3, retiring_voices: 1, frames_rendered: 512, dropped_msgs: 1 });
  }

  #[test]
  fn forced_panic_is_taken_once() {
    let s = EngineStatus::new();
    s.request_panic();
    s.request_panic();
    s.force_panic();
    assert_eq!(s.panics_queued(), 1);
    assert!(s.take_forced_panic());
    assert!(!s.take_forced_panic());
  }
}
