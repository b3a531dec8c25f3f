use super::Smooth;

/// Hard ceiling on the feedback path; the loop can never self-oscillate.
pub const MAX_FEEDBACK: f32 = 0.9;

/// Feedback delay with smoothed time/feedback/mix and a linear-interpolated read.
pub struct SimpleDelay {
  buf: Vec<f32>,
  wr: usize,
  len: usize,
  time_samp: Smooth,
  fb: Smooth,
  wet: Smooth,
}

impl SimpleDelay {
  pub fn new(max_ms: f32, sr: f32, time_s: f32, feedback: f32, mix: f32) -> Self {
    let len = (((max_ms / 1000.0) * sr).ceil().max(64.0)) as usize;
    Self {
      buf: vec![0.0; len],
      wr: 0,
      len,
      time_samp: Smooth::with_value(sr, 15.0, time_s * sr),
      fb: Smooth::with_value(sr, 8.0, feedback.clamp(0.0, MAX_FEEDBACK)),
      wet: Smooth::with_value(sr, 8.0, mix.clamp(0.0, 1.0)),
    }
  }
  #[inline]
  fn wrap(len: usize, i: i32) -> usize { let m = len as i32; let mut k = i % m; if k < 0 { k += m; } k as usize }
  #[inline]
  fn lerp(buf: &[f32], idx: f32, len: usize) -> f32 { let i0 = idx.floor() as i32; let frac = idx - i0 as f32; let i1 = i0 + 1; let s0 = buf[Self::wrap(len, i0)]; let s1 = buf[Self::wrap(len, i1)]; s0 + (s1 - s0) * frac }

  /// Dry and delayed signal mixed as `dry * (1 - mix) + wet * mix`.
  #[inline]
  pub fn process(&mut self, x: f32, sr: f32, time_s: f32, feedback: f32, mix: f32) -> f32 {
    let max_len = self.len.saturating_sub(2) as f32;
    let d = self.time_samp.next((time_s * sr).clamp(1.0, max_len));
    let fb = self.fb.next(feedback.clamp(0.0, MAX_FEEDBACK));
    let wet = self.wet.next(mix.clamp(0.0, 1.0));
    // read delayed BEFORE writing
    let y = Self::lerp(&self.buf, self.wr as f32 - d, self.len);
    self.buf[self.wr] = x + y * fb;
    self.wr += 1; if self.wr >= self.len { self.wr = 0; }
    x * (1.0 - wet) + y * wet
  }
}
