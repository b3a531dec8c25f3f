//! Property-based tests: parameter clamping, octave bounds, and voice
//! bookkeeping under random key sequences.

use proptest::prelude::*;
use keysynth::engine::envelope::{EnvelopeMode, EnvelopeSpec};
use keysynth::engine::params::{self, Range};
use keysynth::engine::voice::{NoteId, Waveform};
use keysynth::engine::voice_manager::{NoteRequest, VoiceManager, RELEASE_MARGIN_S};
use keysynth::{EngineConfig, Param, Synth, SynthParams};

const RANGED: [(&str, Range); 13] = [
  ("volume", params::VOLUME),
  ("attackTime", params::ATTACK),
  ("decayTime", params::DECAY),
  ("sustainLevel", params::SUSTAIN),
  ("releaseTime", params::RELEASE),
  ("filterCutoff", params::CUTOFF),
  ("filterResonance", params::RESONANCE),
  ("delayTime", params::DELAY_TIME),
  ("delayFeedback", params::DELAY_FEEDBACK),
  ("delayMix", params::DELAY_MIX),
  ("reverbWet", params::REVERB_WET),
  ("lfoRate", params::LFO_RATE),
  ("lfoDepth", params::LFO_DEPTH),
];

fn stored(p: &SynthParams, name: &str) -> f32 {
  match name {
    "volume" => p.volume,
    "attackTime" => p.envelope.attack_time,
    "decayTime" => p.envelope.decay_time,
    "sustainLevel" => p.envelope.sustain_level,
    "releaseTime" => p.envelope.release_time,
    "filterCutoff" => p.effects.filter.cutoff_hz,
    "filterResonance" => p.effects.filter.resonance,
    "delayTime" => p.effects.delay.time_s,
    "delayFeedback" => p.effects.delay.feedback,
    "delayMix" => p.effects.delay.mix,
    "reverbWet" => p.effects.reverb.wet,
    "lfoRate" => p.modulation.rate_hz,
    "lfoDepth" => p.modulation.depth,
    _ => unreachable!(),
  }
}

fn request() -> NoteRequest {
  NoteRequest {
    waveform: Waveform::Sawtooth,
    freq: 330.0,
    env: EnvelopeSpec { mode: EnvelopeMode::Adsr, attack: 0.02, decay: 0.05, sustain: 0.6, release: 0.1, peak: 0.5 },
    pitch_tap: None,
  }
}

#[derive(Clone, Debug)]
enum Ev { On(u8), Off(u8), Wait(u8), Panic }

fn event() -> impl Strategy<Value = Ev> {
  prop_oneof![
    4 => (0u8..6).prop_map(Ev::On),
    3 => (0u8..6).prop_map(Ev::Off),
    3 => (1u8..40).prop_map(Ev::Wait),
    1 => Just(Ev::Panic),
  ]
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(200))]

  /// Whatever number arrives, the stored value lies inside its range.
  #[test]
  fn every_numeric_parameter_clamps(idx in 0usize..RANGED.len(), v in any::<f32>()) {
    let (name, range) = RANGED[idx];
    let mut s = Synth::offline(EngineConfig::default());
    let applied = s.set_parameter(name, v);
    prop_assert!(applied.is_some());
    let got = stored(s.params(), name);
    prop_assert!(got >= range.min && got <= range.max, "{name}={v} stored {got}");
  }

  /// Octave shift stays in [-2, 2] for any sequence of shifts.
  #[test]
  fn octave_shift_stays_bounded(ups in prop::collection::vec(any::<bool>(), 0..40)) {
    let mut s = Synth::offline(EngineConfig::default());
    for up in ups {
      let o = if up { s.octave_up() } else { s.octave_down() };
      prop_assert!((-2..=2).contains(&o));
    }
    prop_assert_eq!(s.set(Param::OctaveShift(i32::MAX)), Param::OctaveShift(2));
  }

  /// At most one non-retiring voice per key, finite output, and everything
  /// drains once all keys are released.
  #[test]
  fn voice_bookkeeping_survives_random_play(events in prop::collection::vec(event(), 1..120)) {
    let sr = 2000.0;
    let mut vm = VoiceManager::new(sr, 8);
    let mut t = 0.0f64;
    let dt = 1.0 / sr as f64;
    for ev in events {
      match ev {
        Ev::On(k) => vm.note_on(NoteId(k as u32), request(), t),
        Ev::Off(k) => vm.note_off(NoteId(k as u32), t, 0.1),
        Ev::Panic => vm.panic(t),
        Ev::Wait(n) => {
          vm.maintain(t);
          for _ in 0..n {
            let y = vm.render(t, 0.0);
            prop_assert!(y.is_finite());
            t += dt;
          }
        }
      }
      for k in 0..6u32 {
        let live = vm.voices().filter(|v| v.note == NoteId(k) && !v.is_retiring()).count();
        prop_assert!(live <= 1, "key {k} has {live} live voices");
      }
      prop_assert!(vm.voices().count() <= vm.capacity());
    }
    vm.release_all(t, 0.1);
    vm.maintain(t + 0.1 + RELEASE_MARGIN_S + 0.01);
    prop_assert!(vm.is_silent());
  }
}
