//! End-to-end behaviour of the offline synth: everything goes through the
//! same message queue and block loop the device callback uses.

use keysynth::engine::modulation::ModRoute;
use keysynth::engine::voice::{VoiceStage, Waveform};
use keysynth::engine::voice_manager::RELEASE_MARGIN_S;
use keysynth::{EngineConfig, NoteId, Param, Synth};

const SR: u32 = 8000;

fn synth_with_block(block: usize) -> Synth {
  let cfg = EngineConfig { offline_sample_rate: SR, offline_block: block, reverb_seconds: 0.25, ..EngineConfig::default() };
  let mut s = Synth::offline(cfg);
  s.initialize().unwrap();
  s
}

fn synth() -> Synth { synth_with_block(128) }

fn frames(secs: f64) -> usize { (secs * SR as f64).ceil() as usize }

fn peak(buf: &[f32]) -> f32 { buf.iter().fold(0.0f32, |m, x| m.max(x.abs())) }

#[test]
fn note_off_reaches_silence_within_release_plus_margin() {
  let mut s = synth();
  s.set_parameter("delayMix", 0.0f32);
  s.set_parameter("reverbWet", 0.0f32);
  let a = NoteId::from('a');
  s.note_on(a);
  assert!(peak(&s.render(frames(0.2)).unwrap()) > 0.01);
  s.note_off(a);
  let release = s.params().envelope.release_time as f64;
  s.render(frames(release + RELEASE_MARGIN_S) + 256).unwrap();
  let g = s.graph().unwrap();
  assert!(g.voices().is_silent());
  assert_eq!(g.voices().stage_of(a, g.now()), None);
  assert!(peak(&s.render(512).unwrap()) < 1e-3);
}

#[test]
fn envelope_levels_follow_attack_decay_sustain() {
  let mut s = synth();
  s.set(Param::Attack(0.1));
  s.set(Param::Decay(0.2));
  s.set(Param::Sustain(0.7));
  s.set(Param::Volume(0.5));
  let a = NoteId::from('a');
  s.note_on(a);
  s.render(128).unwrap();
  let v = s.graph().unwrap().voices();
  assert_eq!(v.bound_voice(a).map(|v| v.start_time), Some(0.0));
  assert!((v.level_of(a, 0.1) - 0.5).abs() < 1e-3);
  assert!((v.level_of(a, 0.3) - 0.35).abs() < 1e-3);
  assert!((v.level_of(a, 4.0) - 0.35).abs() < 1e-3);
  s.render(frames(0.5)).unwrap();
  let g = s.graph().unwrap();
  assert_eq!(g.voices().stage_of(a, g.now()), Some(VoiceStage::Sustaining));
}

#[test]
fn rapid_retriggers_never_stack_voices() {
  let mut s = synth_with_block(32);
  s.set(Param::Attack(0.01));
  let a = NoteId::from('a');
  let peak_level = s.params().volume;
  for _ in 0..40 {
    s.note_on(a);
    for _ in 0..3 {
      s.render(32).unwrap();
      let g = s.graph().unwrap();
      let live = g.voices().voices().filter(|v| v.note == a && !v.is_retiring()).count();
      assert!(live <= 1);
      assert!(g.voices().note_level(a, g.now()) <= peak_level * 1.5 + 1e-6);
    }
  }
  s.note_off(a);
  s.render(frames(1.0)).unwrap();
  assert!(s.graph().unwrap().voices().is_silent());
}

#[test]
fn panic_silences_every_voice_within_one_block() {
  for held in [0usize, 1, 5, 9] {
    let mut s = synth();
    for c in "asdfghjkl".chars().take(held) { s.note_on(NoteId::from(c)); }
    s.render(512).unwrap();
    assert_eq!(s.status().active_voices, held);
    s.panic();
    s.render(128).unwrap();
    let st = s.status();
    assert_eq!((st.active_voices, st.retiring_voices), (0, 0));
    assert!(s.graph().unwrap().voices().is_silent());
  }
}

#[test]
fn focus_loss_is_a_panic_and_release_all_ramps() {
  let mut s = synth();
  for c in "asd".chars() { s.note_on(NoteId::from(c)); }
  s.render(256).unwrap();
  s.release_all();
  s.render(128).unwrap();
  assert_eq!(s.status().active_voices, 0);
  assert_eq!(s.status().retiring_voices, 3);
  s.focus_lost();
  s.render(128).unwrap();
  assert!(s.graph().unwrap().voices().is_silent());
}

#[test]
fn octave_shift_clamps_and_only_affects_new_notes() {
  let mut s = synth();
  s.note_on(NoteId::from('h'));
  for _ in 0..5 { s.octave_up(); }
  assert_eq!(s.octave_shift(), 2);
  s.note_on(NoteId::from('j'));
  s.render(128).unwrap();
  let v = s.graph().unwrap().voices();
  assert_eq!(v.bound_voice(NoteId::from('h')).map(|v| v.freq), Some(440.0));
  assert_eq!(v.bound_voice(NoteId::from('j')).map(|v| v.freq), Some(493.88 * 4.0));
}

#[test]
fn out_of_range_parameters_clamp() {
  let mut s = synth();
  assert_eq!(s.set_parameter("filterCutoff", 999_999.0f32), Some(Param::FilterCutoff(20_000.0)));
  assert_eq!(s.set_parameter("reverbWet", -1.0f32), Some(Param::ReverbWet(0.0)));
  s.render(128).unwrap();
  let p = s.graph().unwrap().params();
  assert_eq!(p.effects.filter.cutoff_hz, 20_000.0);
  assert_eq!(p.effects.reverb.wet, 0.0);
}

#[test]
fn lfo_target_switch_leaves_sounding_notes_alone() {
  let mut s = synth();
  s.set_parameter("lfoEnabled", true);
  s.note_on(NoteId::from('a'));
  s.render(128).unwrap();
  s.set_parameter("lfoTarget", "pitch");
  s.note_on(NoteId::from('s'));
  s.render(128).unwrap();
  let g = s.graph().unwrap();
  assert_eq!(g.lfo().route(), ModRoute::Pitch);
  assert_eq!(g.lfo().shared_route(), None);
  assert_eq!(g.voices().bound_voice(NoteId::from('a')).and_then(|v| v.pitch_tap()), None);
  assert!(g.voices().bound_voice(NoteId::from('s')).and_then(|v| v.pitch_tap()).is_some());
}

#[test]
fn presets_do_not_touch_sounding_voices() {
  let mut s = synth();
  s.note_on(NoteId::from('a'));
  s.render(128).unwrap();
  let before = s.graph().unwrap().voices().bound_voice(NoteId::from('a')).map(|v| (v.id, v.waveform));
  assert!(s.apply_preset_named("bass"));
  assert!(!s.apply_preset_named("no such preset"));
  s.note_on(NoteId::from('s'));
  s.render(128).unwrap();
  let v = s.graph().unwrap().voices();
  assert_eq!(v.bound_voice(NoteId::from('a')).map(|v| (v.id, v.waveform)), before);
  assert_eq!(v.bound_voice(NoteId::from('s')).map(|v| v.waveform), Some(Waveform::Sawtooth));
  assert_eq!(s.params().effects.filter.cutoff_hz, 800.0);
}

#[test]
fn scope_tap_does_not_alter_output() {
  let mut plain = synth();
  let mut tapped = synth();
  let reader = tapped.attach_scope().unwrap();
  for s in [&mut plain, &mut tapped] {
    s.note_on(NoteId::from('a'));
    s.note_on(NoteId::from('g'));
  }
  let a = plain.render(4096).unwrap();
  let b = tapped.render(4096).unwrap();
  assert_eq!(a, b);
  let mut frame = Vec::new();
  assert!(reader.latest_into(&mut frame));
  assert_eq!(frame.len(), 2048);
  assert!(frame.iter().any(|x| x.abs() > 1e-3));
}

#[test]
fn unknown_keys_and_stray_note_offs_are_harmless() {
  let mut s = synth();
  s.note_on(NoteId::from('q'));
  s.note_off(NoteId::from('w'));
  s.key_down('a', false);
  s.key_down('a', true);
  s.render(128).unwrap();
  assert_eq!(s.status().active_voices, 1);
  s.key_up('a');
  s.key_up('a');
  s.render(128).unwrap();
  assert_eq!(s.status().active_voices, 0);
}

#[test]
fn panic_jumps_a_backed_up_queue() {
  let mut s = synth();
  assert!(s.apply_preset_named("Spacey Pad"));
  for c in "asdfghjkl".chars() { s.note_on(NoteId::from(c)); }
  s.panic();
  s.render(128).unwrap();
  let st = s.status();
  assert_eq!((st.active_voices, st.retiring_voices), (0, 0));
  assert!(s.graph().unwrap().voices().is_silent());
  assert_eq!(s.params().effects.filter.cutoff_hz, s.graph().unwrap().params().effects.filter.cutoff_hz);
}

#[test]
fn panic_still_lands_when_the_queue_is_full() {
  let cfg = EngineConfig { offline_sample_rate: SR, queue_capacity: 8, reverb_seconds: 0.25, ..EngineConfig::default() };
  let mut s = Synth::offline(cfg);
  s.initialize().unwrap();
  for c in "asdfghjkl".chars() { s.note_on(NoteId::from(c)); }
  s.panic();
  assert!(s.status().dropped_msgs >= 1);
  s.render(128).unwrap();
  assert!(s.graph().unwrap().voices().is_silent());
  s.note_on(NoteId::from('a'));
  s.render(128).unwrap();
  assert_eq!(s.status().active_voices, 1);
}
