//! Piper text-to-speech engine implementation.
//!
//! This module runs Piper VITS voices: text is split into sentences and
//! phonemes, phonemes are mapped to the voice's integer ids, the ONNX model
//! renders each sentence, and the result is quantized to 16-bit PCM.
//!
//! # System Requirements
//!
//! Voices with `"phoneme_type": "espeak"` (most of them) need **espeak-ng**:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! Voices with `"phoneme_type": "text"` use the text's own codepoints and need
//! nothing extra.
//!
//! # Model Layout
//!
//! ```text
//! models/
//! ├── en_US-lessac-medium.onnx        # VITS model
//! └── en_US-lessac-medium.onnx.json   # Voice config (phoneme ids, audio, inference)
//! ```
//!
//! Voices: <https://huggingface.co/rhasspy/piper-voices>
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use piper_rs::{SynthesisEngine, engines::piper::PiperEngine};
//! use std::path::PathBuf;
//!
//! let mut engine = PiperEngine::new();
//! engine.load_model(&PathBuf::from("models/en_US-lessac-medium.onnx"))?;
//!
//! let audio = engine.synthesize("Hello, world!", None)?;
//! println!("Generated {} samples at {}Hz", audio.samples.len(), audio.sample_rate);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Multi-speaker Voice, Slower Speech
//!
//! ```rust,no_run
//! use piper_rs::{SynthesisEngine, engines::piper::{PiperEngine, PiperInferenceParams}};
//! use std::path::PathBuf;
//!
//! let mut engine = PiperEngine::new();
//! engine.load_model(&PathBuf::from("models/en_US-libritts-high.onnx"))?;
//!
//! let params = PiperInferenceParams {
//!     speaker_id: engine.speaker_id("p3922"),
//!     length_scale: Some(1.2),
//!     ..Default::default()
//! };
//!
//! engine.synthesize_to_file("Hello from speaker p3922!", &PathBuf::from("out.wav"), Some(params))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod model;
pub mod phoneme_ids;
pub mod phonemizer;
pub mod pipeline;
pub mod synthesize;

pub use config::{
    ModelConfig, PhonemeType, PhonemizeConfig, SynthesisConfig, SynthesisConfigBuilder,
    VoiceConfig,
};
pub use engine::{find_config_path, PiperEngine, PiperInferenceParams, PiperModelParams, Voice};
#[cfg(feature = "onnx")]
pub use model::OnnxModel;
pub use model::{InferenceEngine, InferenceRequest, PiperError};
pub use phoneme_ids::{phonemes_to_ids, MappedPhonemes, MissingPhonemes};
pub use phonemizer::{
    CodepointPhonemizer, Diacritizer, EspeakConfig, EspeakPhonemizer, Phonemizer,
};
pub use pipeline::Pipeline;
