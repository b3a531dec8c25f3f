//! Convolution reverb with a synthetic decaying-noise impulse response.
//!
//! Uniform partitioned overlap-add: the IR is cut into `BLOCK`-sample
//! partitions, each transformed once at construction. Every full input block is
//! transformed, pushed into a frequency-domain delay line and multiplied
//! against all partitions. All buffers are allocated up front; the render path
//! only reuses them.

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use super::Smooth;

/// Partition length; also the wet path latency in samples.
pub const BLOCK: usize = 256;
const FFT_LEN: usize = BLOCK * 2;
const BINS: usize = BLOCK + 1;

// Matches the usual convolver calibration (-58 dB) at 44.1 kHz.
const GAIN_CALIBRATION: f32 = 0.00125;
const CALIBRATION_SR: f32 = 44_100.0;
const MIN_POWER: f32 = 0.000125;

/// Stereo impulse response: white noise under a `(1 - i/len)^2` envelope.
pub fn decaying_noise_ir(sr: f32, seconds: f32, seed: u32) -> [Vec<f32>; 2] {
  let len = ((sr * seconds).round() as usize).max(1);
  let mut rng = seed.max(1);
  let mut channel = || -> Vec<f32> {
    (0..len).map(|i| {
      // xorshift32
      rng ^= rng << 13; rng ^= rng >> 17; rng ^= rng << 5;
      let n = (rng as f32) * 2.3283064365e-10 * 2.0 - 1.0;
      let decay = (1.0 - i as f32 / len as f32).powi(2);
      n * decay
    }).collect()
  };
  let l = channel();
  let r = channel();
  [l, r]
}

/// Power normalization so IRs of any length land at a similar loudness.
fn normalization_scale(ir: &[Vec<f32>; 2], sr: f32) -> f32 {
  let len = ir[0].len().max(1);
  let power: f32 = ir.iter().flat_map(|c| c.iter()).map(|x| x * x).sum();
  let power = (power / (2 * len) as f32).sqrt().max(MIN_POWER);
  (1.0 / power) * GAIN_CALIBRATION * (CALIBRATION_SR / sr)
}

pub struct ConvolutionReverb {
  fwd: Arc<dyn Fft<f32>>,
  inv: Arc<dyn Fft<f32>>,
  scratch: Vec<Complex32>,
  // [channel][partition] -> BINS spectra
  ir: [Vec<Vec<Complex32>>; 2],
  // ring of past input spectra, newest at `fdl_pos`
  fdl: Vec<Vec<Complex32>>,
  fdl_pos: usize,
  work: Vec<Complex32>,
  acc: [Vec<Complex32>; 2],
  input: Vec<f32>,
  out: [Vec<f32>; 2],
  tail: [Vec<f32>; 2],
  pos: usize,
  wet: Smooth,
}

impl ConvolutionReverb {
  pub fn new(sr: f32, seconds: f32, wet: f32) -> Self {
    Self::with_ir(sr, decaying_noise_ir(sr, seconds, 0x9E37_79B9), wet)
  }

  pub fn with_ir(sr: f32, ir: [Vec<f32>; 2], wet: f32) -> Self {
    let mut planner = FftPlanner::<f32>::new();
    let fwd = planner.plan_fft_forward(FFT_LEN);
    let inv = planner.plan_fft_inverse(FFT_LEN);
    let scratch_len = fwd.get_inplace_scratch_len().max(inv.get_inplace_scratch_len());
    let mut scratch = vec![Complex32::new(0.0, 0.0); scratch_len];
    let scale = normalization_scale(&ir, sr);
    let parts = ir[0].len().max(ir[1].len()).div_ceil(BLOCK).max(1);
    let mut spectra = |chan: &[f32]| -> Vec<Vec<Complex32>> {
      (0..parts).map(|p| {
        let mut buf = vec![Complex32::new(0.0, 0.0); FFT_LEN];
        let start = p * BLOCK;
        for (i, x) in chan.iter().skip(start).take(BLOCK).enumerate() { buf[i].re = x * scale; }
        fwd.process_with_scratch(&mut buf, &mut scratch);
        buf.truncate(BINS);
        buf
      }).collect()
    };
    let ir = [spectra(&ir[0]), spectra(&ir[1])];
    Self {
      fdl: vec![vec![Complex32::new(0.0, 0.0); BINS]; parts],
      fdl_pos: 0,
      work: vec![Complex32::new(0.0, 0.0); FFT_LEN],
      acc: [vec![Complex32::new(0.0, 0.0); BINS], vec![Complex32::new(0.0, 0.0); BINS]],
      input: vec![0.0; BLOCK],
      out: [vec![0.0; BLOCK], vec![0.0; BLOCK]],
      tail: [vec![0.0; BLOCK], vec![0.0; BLOCK]],
      pos: 0,
      wet: Smooth::with_value(sr, 10.0, wet.clamp(0.0, 1.0)),
      fwd,
      inv,
      scratch,
      ir,
    }
  }

  pub fn partitions(&self) -> usize { self.fdl.len() }

  /// Dry/wet crossfade with `dry = 1 - wet`.
  #[inline]
  pub fn process(&mut self, x: f32, wet: f32) -> (f32, f32) {
    let w = self.wet.next(wet.clamp(0.0, 1.0));
    self.input[self.pos] = x;
    let (yl, yr) = (self.out[0][self.pos], self.out[1][self.pos]);
    self.pos += 1;
    if self.pos == BLOCK { self.pos = 0; self.run_block(); }
    let dry = x * (1.0 - w);
    (dry + yl * w, dry + yr * w)
  }

  fn run_block(&mut self) {
    let parts = self.fdl.len();
    self.fdl_pos = (self.fdl_pos + parts - 1) % parts;
    for (i, c) in self.work.iter_mut().enumerate() {
      *c = Complex32::new(if i < BLOCK { self.input[i] } else { 0.0 }, 0.0);
    }
    self.fwd.process_with_scratch(&mut self.work, &mut self.scratch);
    self.fdl[self.fdl_pos].copy_from_slice(&self.work[..BINS]);

    for ch in 0..2 {
      let acc = &mut self.acc[ch];
      acc.iter_mut().for_each(|c| *c = Complex32::new(0.0, 0.0));
      for p in 0..parts {
        let x = &self.fdl[(self.fdl_pos + p) % parts];
        let h = &self.ir[ch][p];
        for k in 0..BINS { acc[k] += x[k] * h[k]; }
      }
      // rebuild the full spectrum from the real-signal half
      self.work[..BINS].copy_from_slice(acc);
      for k in 1..BLOCK { self.work[FFT_LEN - k] = acc[k].conj(); }
      self.inv.process_with_scratch(&mut self.work, &mut self.scratch);
      let norm = 1.0 / FFT_LEN as f32;
      for i in 0..BLOCK {
        self.out[ch][i] = self.work[i].re * norm + self.tail[ch][i];
        self.tail[ch][i] = self.work[BLOCK + i].re * norm;
      }
    }
  }
}
