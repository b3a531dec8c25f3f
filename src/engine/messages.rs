use serde::{Deserialize, Serialize};

use crate::engine::params::Param;
use crate::engine::state::ScopeTap;
use crate::engine::voice::NoteId;

/// Loosely typed value as it arrives from a UI control or preset file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
  Bool(bool),
  I32(i32),
  F32(f32),
  Str(String),
}

impl From<f32> for ParamValue { fn from(v: f32) -> Self { Self::F32(v) } }
impl From<f64> for ParamValue { fn from(v: f64) -> Self { Self::F32(v as f32) } }
impl From<i32> for ParamValue { fn from(v: i32) -> Self { Self::I32(v) } }
impl From<bool> for ParamValue { fn from(v: bool) -> Self { Self::Bool(v) } }
impl From<&str> for ParamValue { fn from(v: &str) -> Self { Self::Str(v.to_string()) } }
impl From<String> for ParamValue { fn from(v: String) -> Self { Self::Str(v) } }

/// Control thread -> render thread. Applied at the start of a render block.
pub enum EngineMsg {
  NoteOn { note: NoteId, freq: f32 },
  NoteOff { note: NoteId },
  SetParam(Param),
  ReleaseAll,
  Panic,
  AttachScope(Box<ScopeTap>),
}
