use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use keysynth::{init_logging, EngineConfig, Synth, FACTORY_PRESETS};

#[derive(Parser)]
#[command(name = "keysynth", about = "Polyphonic keyboard synth")]
struct Cli {
  /// JSON engine config; missing keys keep their defaults.
  #[arg(long, global = true)]
  config: Option<PathBuf>,
  #[command(subcommand)]
  cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
  /// Play a short phrase on the default output device.
  Play {
    #[arg(long, default_value = "Default")]
    preset: String,
    /// Keys from the home row, e.g. "asdfghjkl".
    #[arg(long, default_value = "adgkgda")]
    keys: String,
    #[arg(long, default_value_t = 300)]
    note_ms: u64,
  },
  /// Render the same kind of phrase offline into a WAV file.
  Render {
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = "Default")]
    preset: String,
    #[arg(long, default_value = "adgkgda")]
    keys: String,
    #[arg(long, default_value_t = 300)]
    note_ms: u64,
    /// Silence rendered after the last note so tails can ring out.
    #[arg(long, default_value_t = 2.0)]
    tail_s: f32,
  },
  /// Print the factory presets as JSON.
  Presets,
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
  match path {
    Some(p) => EngineConfig::from_json_file(p).with_context(|| format!("reading config {}", p.display())),
    None => Ok(EngineConfig::default()),
  }
}

fn main() -> Result<()> {
  init_logging();
  let cli = Cli::parse();
  let config = load_config(cli.config.as_ref())?;
  match cli.cmd {
    Cmd::Play { preset, keys, note_ms } => play(config, &preset, &keys, note_ms),
    Cmd::Render { out, preset, keys, note_ms, tail_s } => render(config, &out, &preset, &keys, note_ms, tail_s),
    Cmd::Presets => {
      println!("{}", serde_json::to_string_pretty(&*FACTORY_PRESETS)?);
      Ok(())
    }
  }
}

fn play(config: EngineConfig, preset: &str, keys: &str, note_ms: u64) -> Result<()> {
  let mut synth = Synth::new(config);
  if !synth.apply_preset_named(preset) { bail!("unknown preset `{preset}`"); }
  synth.initialize().context("opening audio output")?;
  let hold = Duration::from_millis(note_ms);
  for key in keys.chars() {
    synth.key_down(key, false);
    thread::sleep(hold);
    synth.key_up(key);
  }
  let release = synth.params().envelope.release_time;
  thread::sleep(Duration::from_secs_f32(release + 1.0));
  let status = synth.status();
  log::info!("done: {} frames rendered, {} messages dropped", status.frames_rendered, status.dropped_msgs);
  synth.shutdown();
  Ok(())
}

fn render(config: EngineConfig, out: &Path, preset: &str, keys: &str, note_ms: u64, tail_s: f32) -> Result<()> {
  let mut synth = Synth::offline(config);
  if !synth.apply_preset_named(preset) { bail!("unknown preset `{preset}`"); }
  synth.initialize()?;
  let sr = synth.sample_rate().context("offline synth has no sample rate")?;
  let note_frames = ((note_ms as f32 / 1000.0) * sr).round() as usize;
  let spec = hound::WavSpec { channels: 2, sample_rate: sr as u32, bits_per_sample: 32, sample_format: hound::SampleFormat::Float };
  let mut writer = hound::WavWriter::create(out, spec).with_context(|| format!("creating {}", out.display()))?;
  let mut write = |buf: &[f32]| -> Result<()> {
    for &s in buf { writer.write_sample(s)?; }
    Ok(())
  };
  for key in keys.chars() {
    synth.key_down(key, false);
    write(&synth.render(note_frames)?)?;
    synth.key_up(key);
  }
  let tail_frames = (tail_s.max(0.0) * sr).round() as usize;
  write(&synth.render(tail_frames)?)?;
  writer.finalize()?;
  log::info!("wrote {} ({} notes)", out.display(), keys.chars().count());
  Ok(())
}
