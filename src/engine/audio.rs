use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;

use crate::config::EngineConfig;
use crate::error::EngineError;

use super::{graph::EngineGraph, messages::EngineMsg};

/// Output device plus the running stream. The graph moves into the callback on
/// `start`; from then on the control side only talks to it through the queue.
pub struct AudioEngine {
  pub sr: f32,
  pub channels: u16,
  device: cpal::Device,
  cfg: cpal::StreamConfig,
  stream: Option<cpal::Stream>,
}

impl AudioEngine {
  pub fn open(config: &EngineConfig) -> Result<Self, EngineError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(EngineError::NoDevice)?;
    let chosen = choose_config(&device, &config.preferred_sample_rates)?;
    let mut cfg: cpal::StreamConfig = chosen.into();
    // Request a larger buffer for better stability; reduce underruns
    cfg.buffer_size = cpal::BufferSize::Fixed(config.buffer_frames);
    let sr = cfg.sample_rate.0 as f32;
    log::info!("output device {:?}: {} Hz, {} ch, {} frame buffer",
      device.name().unwrap_or_else(|_| "<unnamed>".into()), cfg.sample_rate.0, cfg.channels, config.buffer_frames);
    Ok(Self { sr, channels: cfg.channels, device, cfg, stream: None })
  }

  pub fn is_running(&self) -> bool { self.stream.is_some() }

  pub fn start(&mut self, mut graph: EngineGraph, rx: Receiver<EngineMsg>, max_msgs: usize) -> Result<(), EngineError> {
    if self.stream.is_some() { return Ok(()); }
    let channels = self.channels as usize;
    let max_msgs = max_msgs.max(1);
    let err_fn = |e: cpal::StreamError| log::error!("stream error: {e}");
    let stream = self.device.build_output_stream(&self.cfg, move |data: &mut [f32], _| {
      // Drain messages without blocking (tight cap to avoid starving audio)
      graph.drain(&rx, max_msgs);
      graph.process(data, channels);
    }, err_fn, None)?;
    stream.play()?;
    self.stream = Some(stream);
    Ok(())
  }

  pub fn stop(&mut self) {
    if self.stream.take().is_some() { log::info!("output stream stopped"); }
  }
}

/// Stereo f32 at the first preferred rate the device supports, else the
/// highest stereo f32 rate, else whatever the device calls its default.
fn choose_config(device: &cpal::Device, preferred: &[u32]) -> Result<cpal::SupportedStreamConfig, EngineError> {
  let ranges: Vec<cpal::SupportedStreamConfigRange> = device.supported_output_configs()
    .map(|it| it.filter(|r| r.channels() == 2 && r.sample_format() == cpal::SampleFormat::F32).collect())
    .unwrap_or_default();
  for &sr in preferred {
    if let Some(r) = ranges.iter().find(|r| r.min_sample_rate().0 <= sr && r.max_sample_rate().0 >= sr) {
      return Ok(r.clone().with_sample_rate(cpal::SampleRate(sr)));
    }
  }
  if let Some(r) = ranges.into_iter().next() { return Ok(r.with_max_sample_rate()); }
  let fallback = device.default_output_config().map_err(|e| EngineError::DeviceConfig(e.to_string()))?;
  if fallback.sample_format() != cpal::SampleFormat::F32 {
    return Err(EngineError::DeviceConfig(format!("default format {:?} is not f32", fallback.sample_format())));
  }
  Ok(fallback)
}
