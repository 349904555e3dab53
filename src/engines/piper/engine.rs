use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::{SynthesisEngine, SynthesizedAudio};

use super::config::{SpeakerId, VoiceConfig};
use super::model::{InferenceEngine, PiperError};
use super::phonemizer::{phonemizer_for, Diacritizer, EspeakConfig, Phonemizer};
use super::pipeline::Pipeline;

/// Parameters for configuring Piper voice loading.
#[derive(Debug, Clone, Default)]
pub struct PiperModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Voice config document. `None` looks for `<model>.json` next to the model.
    pub config_path: Option<PathBuf>,
    /// Speaker for multi-speaker voices. `None` selects speaker 0.
    pub speaker_id: Option<SpeakerId>,
}

/// Per-request overrides of the voice's synthesis settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PiperInferenceParams {
    /// Ignored for single-speaker voices.
    pub speaker_id: Option<SpeakerId>,
    pub noise_scale: Option<f32>,
    /// Phoneme duration multiplier; larger is slower speech.
    pub length_scale: Option<f32>,
    pub noise_w: Option<f32>,
    pub sentence_silence_seconds: Option<f32>,
}

impl PiperInferenceParams {
    fn apply(&self, base: &VoiceConfig) -> VoiceConfig {
        let mut config = base.clone();
        if self.speaker_id.is_some() {
            config.select_speaker(self.speaker_id);
        }
        let synthesis = &mut config.synthesis;
        if let Some(v) = self.noise_scale {
            synthesis.noise_scale = v;
        }
        if let Some(v) = self.length_scale {
            synthesis.length_scale = v;
        }
        if let Some(v) = self.noise_w {
            synthesis.noise_w = v;
        }
        if let Some(v) = self.sentence_silence_seconds {
            synthesis.sentence_silence_seconds = v;
        }
        config
    }
}

/// A loaded voice: its parsed config and the model that renders it.
pub struct Voice {
    config: VoiceConfig,
    model: Box<dyn InferenceEngine>,
}

impl Voice {
    /// Wrap an already-open model. The speaker rule is applied to `config`
    /// using whatever speaker id it already carries.
    pub fn new(mut config: VoiceConfig, model: Box<dyn InferenceEngine>) -> Self {
        let speaker = config.synthesis.speaker_id;
        config.select_speaker(speaker);
        log::debug!("Voice contains {} speaker(s)", config.model.num_speakers);
        Self { config, model }
    }

    /// Load a Piper `.onnx` model and its JSON config.
    #[cfg(feature = "onnx")]
    pub fn load(
        model_path: &Path,
        config_path: &Path,
        speaker_id: Option<SpeakerId>,
        num_threads: Option<usize>,
    ) -> Result<Self, PiperError> {
        let mut config = VoiceConfig::load(config_path)?;
        config.synthesis.speaker_id = speaker_id;
        let model = super::model::OnnxModel::load(model_path, num_threads)?;
        Ok(Self::new(config, Box::new(model)))
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Speaker names from the voice config, sorted.
    pub fn list_speakers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .config
            .model
            .speaker_id_map
            .iter()
            .flat_map(|m| m.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names
    }
}

/// The config that accompanies a Piper model: `voice.onnx` → `voice.onnx.json`.
pub fn find_config_path(model_path: &Path) -> Result<PathBuf, PiperError> {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".json");
    let config_path = PathBuf::from(name);
    if config_path.exists() {
        return Ok(config_path);
    }

    Err(PiperError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!(
            "Voice config not found at {}. Download the .onnx.json next to the model.",
            config_path.display()
        ),
    )))
}

/// Piper text-to-speech engine.
///
/// # Quick Start
///
/// ```rust,no_run
/// use piper_rs::{SynthesisEngine, engines::piper::PiperEngine};
/// use std::path::PathBuf;
///
/// // Uses system espeak-ng from PATH
/// let mut engine = PiperEngine::new();
/// engine.load_model(&PathBuf::from("models/en_US-lessac-medium.onnx"))?;
/// let audio = engine.synthesize("Hello, world!", None)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PiperEngine {
    voice: Option<Voice>,
    model_path: Option<PathBuf>,
    espeak: EspeakConfig,
    phonemizer: Option<Box<dyn Phonemizer>>,
    diacritizer: Option<Box<dyn Diacritizer>>,
}

impl Default for PiperEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PiperEngine {
    /// Create a new engine that uses `espeak-ng` from PATH.
    pub fn new() -> Self {
        Self {
            voice: None,
            model_path: None,
            espeak: EspeakConfig::default(),
            phonemizer: None,
            diacritizer: None,
        }
    }

    /// Create a new engine with explicit espeak-ng binary and data paths.
    pub fn with_espeak(bin_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Self {
        let mut engine = Self::new();
        engine.espeak = EspeakConfig {
            bin_path,
            data_path,
        };
        engine
    }

    /// Use `phonemizer` instead of the one the voice's phoneme type selects.
    pub fn set_phonemizer(&mut self, phonemizer: Box<dyn Phonemizer>) {
        self.phonemizer = Some(phonemizer);
    }

    /// Diacritize text before phonemization.
    pub fn set_diacritizer(&mut self, diacritizer: Box<dyn Diacritizer>) {
        self.diacritizer = Some(diacritizer);
    }

    /// Install an already-built voice.
    pub fn set_voice(&mut self, voice: Voice) {
        self.voice = Some(voice);
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// Resolve a speaker name from the voice's `speaker_id_map`.
    pub fn speaker_id(&self, name: &str) -> Option<SpeakerId> {
        self.voice.as_ref()?.config.model.speaker_id(name)
    }

    /// Synthesize, delivering audio one sentence at a time.
    pub fn synthesize_streaming(
        &mut self,
        text: &str,
        params: Option<&PiperInferenceParams>,
        on_sentence: &mut dyn FnMut(&[i16]),
    ) -> Result<SynthesizedAudio, PiperError> {
        self.run(text, params, Some(on_sentence))
    }

    fn run(
        &mut self,
        text: &str,
        params: Option<&PiperInferenceParams>,
        on_sentence: Option<&mut dyn FnMut(&[i16])>,
    ) -> Result<SynthesizedAudio, PiperError> {
        let voice = self.voice.as_mut().ok_or(PiperError::ModelNotLoaded)?;

        let config = match params {
            Some(p) => Cow::Owned(p.apply(&voice.config)),
            None => Cow::Borrowed(&voice.config),
        };

        let mut default_phonemizer;
        let phonemizer: &mut dyn Phonemizer = match self.phonemizer.as_deref_mut() {
            Some(p) => p,
            None => {
                default_phonemizer = phonemizer_for(&config.phonemize, &self.espeak);
                default_phonemizer.as_mut()
            }
        };

        let mut pipeline = Pipeline::new(&config, phonemizer, voice.model.as_mut());
        if let Some(diacritizer) = self.diacritizer.as_deref_mut() {
            pipeline = pipeline.with_diacritizer(diacritizer);
        }

        match on_sentence {
            Some(callback) => pipeline.text_to_audio_streaming(text, callback),
            None => pipeline.text_to_audio(text),
        }
    }
}

impl Drop for PiperEngine {
    fn drop(&mut self) {
        self.unload_model();
    }
}

impl SynthesisEngine for PiperEngine {
    type SynthesisParams = PiperInferenceParams;
    type ModelParams = PiperModelParams;

    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = match &params.config_path {
            Some(path) => path.clone(),
            None => find_config_path(model_path)?,
        };
        let voice = load_voice(model_path, &config_path, &params)?;
        self.voice = Some(voice);
        self.model_path = Some(model_path.to_path_buf());
        Ok(())
    }

    fn unload_model(&mut self) {
        self.voice = None;
        self.model_path = None;
    }

    fn synthesize(
        &mut self,
        text: &str,
        params: Option<Self::SynthesisParams>,
    ) -> Result<SynthesizedAudio, Box<dyn std::error::Error>> {
        Ok(self.run(text, params.as_ref(), None)?)
    }
}

#[cfg(feature = "onnx")]
fn load_voice(
    model_path: &Path,
    config_path: &Path,
    params: &PiperModelParams,
) -> Result<Voice, PiperError> {
    Voice::load(model_path, config_path, params.speaker_id, params.num_threads)
}

#[cfg(not(feature = "onnx"))]
fn load_voice(
    _model_path: &Path,
    config_path: &Path,
    _params: &PiperModelParams,
) -> Result<Voice, PiperError> {
    // Still surface config errors before reporting the missing backend.
    VoiceConfig::load(config_path)?;
    Err(PiperError::Inference(
        "piper-rs was built without the `onnx` feature".to_string(),
    ))
}
