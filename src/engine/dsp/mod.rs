pub mod delay;
pub mod filter;
pub mod reverb;

/// One-pole parameter smoother. Every control the render path reads goes
/// through one of these so a parameter write never lands as a step.
pub struct Smooth { pub y: f32, a: f32 }
impl Smooth {
  pub fn new(sr: f32, ms: f32) -> Self {
    let a = (-1.0 / (ms * 0.001 * sr)).exp();
    Self { y: 0.0, a }
  }
  pub fn with_value(sr: f32, ms: f32, y: f32) -> Self { let mut s = Self::new(sr, ms); s.y = y; s }
  #[inline]
  pub fn next(&mut self, target: f32) -> f32 { self.y = self.a * self.y + (1.0 - self.a) * target; self.y }
}
