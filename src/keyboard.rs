//! Computer-keyboard layout: one row of white keys from middle C, plus the
//! two octave keys.

use crate::engine::voice::NoteId;

pub const KEY_MAP: [(char, f32); 9] = [
  ('a', 261.63), // C4
  ('s', 293.66),
  ('d', 329.63),
  ('f', 349.23),
  ('g', 392.00),
  ('h', 440.00),
  ('j', 493.88),
  ('k', 523.25),
  ('l', 587.33), // D5
];

pub const OCTAVE_DOWN_KEY: char = 'z';
pub const OCTAVE_UP_KEY: char = 'x';

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyAction {
  Note { note: NoteId, base_freq: f32 },
  OctaveDown,
  OctaveUp,
}

pub fn base_freq(note: NoteId) -> Option<f32> {
  KEY_MAP.iter().find(|(c, _)| NoteId::from(*c) == note).map(|(_, f)| *f)
}

/// Case-insensitive; `None` for keys the instrument does not use.
pub fn action_for(key: char) -> Option<KeyAction> {
  let key = key.to_ascii_lowercase();
  match key {
    OCTAVE_DOWN_KEY => Some(KeyAction::OctaveDown),
    OCTAVE_UP_KEY => Some(KeyAction::OctaveUp),
    _ => {
      let note = NoteId::from(key);
      base_freq(note).map(|base_freq| KeyAction::Note { note, base_freq })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_white_keys_and_octave_keys() {
    assert_eq!(action_for('H'), Some(KeyAction::Note { note: NoteId::from('h'), base_freq: 440.0 }));
    assert_eq!(action_for('z'), Some(KeyAction::OctaveDown));
    assert_eq!(action_for('x'), Some(KeyAction::OctaveUp));
    assert_eq!(action_for('q'), None);
    assert_eq!(base_freq(NoteId(0)), None);
  }
}
