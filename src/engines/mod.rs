//! Speech synthesis engines.
//!
//! This module contains implementations of text-to-speech engines.
//!
//! # Available Engines
//!
//! - `piper` - Piper VITS voices. Model inference needs the `onnx` feature;
//!   espeak-ng voices also need the `espeak-ng` binary.

pub mod piper;
