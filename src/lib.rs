//! # piper-rs
//!
//! A Rust library for text-to-speech synthesis with Piper VITS voices.
//!
//! ## Features
//!
//! - **Piper voices**: Load any exported Piper `.onnx` model with its `.onnx.json` config
//! - **espeak-ng or codepoint phonemes**: Chosen per voice by its config
//! - **Streaming**: Receive audio one sentence at a time
//! - **WAV output**: 16-bit PCM files with a canonical 44-byte header
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! piper-rs = { version = "2026.2", features = ["onnx"] }
//! ```
//!
//! ```ignore
//! use std::path::PathBuf;
//! use piper_rs::{engines::piper::PiperEngine, SynthesisEngine};
//!
//! let mut engine = PiperEngine::new();
//! engine.load_model(&PathBuf::from("models/en_US-lessac-medium.onnx"))?;
//!
//! let audio = engine.synthesize("Hello, world!", None)?;
//! audio.write_wav(&PathBuf::from("output.wav"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engines;
pub mod wav;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use engines::piper::MissingPhonemes;
use wav::WavParams;

/// Timing for one or more synthesized sentences.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SynthesisResult {
    /// Wall-clock seconds spent in model inference.
    pub infer_seconds: f64,
    /// Seconds of audio produced by the model, excluding inserted silence.
    pub audio_seconds: f64,
    /// `infer_seconds / audio_seconds`, or 0 when no audio was produced.
    pub real_time_factor: f64,
}

impl SynthesisResult {
    pub fn from_seconds(infer_seconds: f64, audio_seconds: f64) -> Self {
        let mut result = Self {
            infer_seconds,
            audio_seconds,
            real_time_factor: 0.0,
        };
        result.update_real_time_factor();
        result
    }

    /// Accumulate another sentence's timings. Call
    /// [`update_real_time_factor`](Self::update_real_time_factor) afterwards.
    pub fn add(&mut self, other: &SynthesisResult) {
        self.infer_seconds += other.infer_seconds;
        self.audio_seconds += other.audio_seconds;
    }

    pub fn update_real_time_factor(&mut self) {
        self.real_time_factor = if self.audio_seconds > 0.0 {
            self.infer_seconds / self.audio_seconds
        } else {
            0.0
        };
    }
}

/// The output of a synthesis (text-to-speech) operation.
///
/// Contains 16-bit PCM samples, their format, timings, and any phonemes the
/// voice could not map.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub result: SynthesisResult,
    pub missing_phonemes: MissingPhonemes,
}

impl SynthesizedAudio {
    pub fn wav_params(&self) -> WavParams {
        WavParams {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }

    /// Encode the audio as an in-memory WAV file.
    pub fn to_wav_bytes(&self) -> std::io::Result<Vec<u8>> {
        wav::encode_wav(&self.samples, self.wav_params())
    }

    /// Write the audio to a 16-bit PCM WAV file.
    ///
    /// The file is not created when the audio format cannot be encoded.
    pub fn write_wav(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let params = self.wav_params();
        wav::wav_header(self.samples.len(), params)?;
        let mut writer = BufWriter::new(File::create(path)?);
        wav::write_wav(&mut writer, &self.samples, params)?;
        Ok(())
    }

    /// Duration of the audio in seconds, silence included.
    pub fn duration_secs(&self) -> f64 {
        let frames = self.samples.len() as f64 / f64::from(self.channels.max(1));
        frames / f64::from(self.sample_rate)
    }
}

/// Common interface for text-to-speech synthesis engines.
///
/// This trait defines the standard operations that all synthesis engines must support.
/// Each engine may have different parameter types for model loading and inference configuration.
pub trait SynthesisEngine {
    /// Parameters for configuring inference behavior (speaker, scales, etc.)
    type SynthesisParams;
    /// Parameters for configuring model loading (threads, config path, etc.)
    type ModelParams: Default;

    /// Load a model from the specified path using default parameters.
    fn load_model(&mut self, model_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.load_model_with_params(model_path, Self::ModelParams::default())
    }

    /// Load a model from the specified path with custom parameters.
    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Unload the currently loaded model and free associated resources.
    fn unload_model(&mut self);

    /// Synthesize speech from the given text.
    fn synthesize(
        &mut self,
        text: &str,
        params: Option<Self::SynthesisParams>,
    ) -> Result<SynthesizedAudio, Box<dyn std::error::Error>>;

    /// Synthesize speech from the given text and write to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SynthesizedAudio::write_wav()`.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        wav_path: &Path,
        params: Option<Self::SynthesisParams>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.synthesize(text, params)?.write_wav(wav_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(samples: Vec<i16>, sample_rate: u32) -> SynthesizedAudio {
        SynthesizedAudio {
            samples,
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
            result: SynthesisResult::default(),
            missing_phonemes: MissingPhonemes::default(),
        }
    }

    #[test]
    fn real_time_factor_is_zero_without_audio() {
        let result = SynthesisResult::from_seconds(1.5, 0.0);
        assert_eq!(result.real_time_factor, 0.0);

        let result = SynthesisResult::from_seconds(1.0, 4.0);
        assert_eq!(result.real_time_factor, 0.25);
    }

    #[test]
    fn totals_accumulate_then_recompute_ratio() {
        let mut total = SynthesisResult::default();
        total.add(&SynthesisResult::from_seconds(0.5, 1.0));
        total.add(&SynthesisResult::from_seconds(0.5, 3.0));
        total.update_real_time_factor();

        assert_eq!(total.infer_seconds, 1.0);
        assert_eq!(total.audio_seconds, 4.0);
        assert_eq!(total.real_time_factor, 0.25);
    }

    #[test]
    fn duration_counts_frames() {
        assert_eq!(audio(vec![0; 8000], 16000).duration_secs(), 0.5);

        let mut stereo = audio(vec![0; 8000], 16000);
        stereo.channels = 2;
        assert_eq!(stereo.duration_secs(), 0.25);
    }

    #[test]
    fn write_wav_matches_in_memory_encoding() {
        let audio = audio(vec![1, -1, 300, i16::MIN], 22050);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        audio.write_wav(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, audio.to_wav_bytes().unwrap());
        assert_eq!(bytes.len(), wav::WAV_HEADER_LEN + 8);

        let samples: Vec<i16> = hound::WavReader::open(&path)
            .unwrap()
            .into_samples::<i16>()
            .map(Result::unwrap)
            .collect();
        assert_eq!(samples, audio.samples);
    }

    #[test]
    fn unsupported_width_is_not_written() {
        let mut audio = audio(vec![1, 2, 3], 22050);
        audio.bits_per_sample = 24;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        assert!(audio.to_wav_bytes().is_err());
        assert!(audio.write_wav(&path).is_err());
        assert!(!path.exists());
    }
}
