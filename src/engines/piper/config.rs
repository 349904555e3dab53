use std::collections::HashMap;
use std::path::Path;

use derive_builder::Builder;
use serde::Deserialize;

use super::model::PiperError;

/// A single Unicode codepoint.
pub type Phoneme = char;
/// Token id consumed by the model.
pub type PhonemeId = i64;
/// Index into a multi-speaker model's speaker embeddings.
pub type SpeakerId = i64;

pub type PhonemeIdMap = HashMap<Phoneme, Vec<PhonemeId>>;
pub type PhonemeMap = HashMap<Phoneme, Vec<Phoneme>>;

pub const DEFAULT_SAMPLE_RATE: u32 = 22050;
pub const DEFAULT_NOISE_SCALE: f32 = 0.667;
pub const DEFAULT_LENGTH_SCALE: f32 = 1.0;
pub const DEFAULT_NOISE_W: f32 = 0.8;
pub const DEFAULT_SENTENCE_SILENCE_SECONDS: f32 = 0.2;
pub const DEFAULT_ESPEAK_VOICE: &str = "en-us";

/// How text is turned into phonemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhonemeType {
    /// IPA phonemes from espeak-ng.
    #[default]
    Espeak,
    /// Text codepoints are used directly as phonemes.
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhonemizeConfig {
    pub phoneme_type: PhonemeType,
    /// Substitutions applied before id lookup (not normally used).
    pub phoneme_map: Option<PhonemeMap>,
    pub phoneme_id_map: PhonemeIdMap,
    pub id_pad: PhonemeId,
    pub id_bos: PhonemeId,
    pub id_eos: PhonemeId,
    /// Put `id_pad` between every pair of ids, not only at the boundaries.
    pub intersperse_pad: bool,
    pub espeak_voice: String,
}

impl Default for PhonemizeConfig {
    fn default() -> Self {
        Self {
            phoneme_type: PhonemeType::Espeak,
            phoneme_map: None,
            phoneme_id_map: HashMap::new(),
            id_pad: 0,
            id_bos: 1,
            id_eos: 2,
            intersperse_pad: true,
            espeak_voice: DEFAULT_ESPEAK_VOICE.to_string(),
        }
    }
}

/// Generation controls and output audio format.
///
/// ```
/// use piper_rs::engines::piper::SynthesisConfigBuilder;
///
/// let config = SynthesisConfigBuilder::default()
///     .sample_rate(16000u32)
///     .sentence_silence_seconds(0.0f32)
///     .build()
///     .unwrap();
/// assert_eq!(config.noise_scale, 0.667);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default)]
pub struct SynthesisConfig {
    pub noise_scale: f32,
    pub length_scale: f32,
    pub noise_w: f32,
    pub sample_rate: u32,
    /// Bytes per sample.
    pub sample_width: u16,
    pub channels: u16,
    #[builder(setter(strip_option))]
    pub speaker_id: Option<SpeakerId>,
    pub sentence_silence_seconds: f32,
    #[builder(setter(strip_option))]
    pub phoneme_silence_seconds: Option<HashMap<Phoneme, f32>>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            noise_scale: DEFAULT_NOISE_SCALE,
            length_scale: DEFAULT_LENGTH_SCALE,
            noise_w: DEFAULT_NOISE_W,
            sample_rate: DEFAULT_SAMPLE_RATE,
            sample_width: 2,
            channels: 1,
            speaker_id: None,
            sentence_silence_seconds: DEFAULT_SENTENCE_SILENCE_SECONDS,
            phoneme_silence_seconds: None,
        }
    }
}

impl SynthesisConfig {
    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }

    /// Number of zero samples covering `seconds` of audio across all channels.
    pub fn silence_samples(&self, seconds: f32) -> usize {
        if seconds <= 0.0 {
            return 0;
        }
        (f64::from(seconds) * f64::from(self.sample_rate) * f64::from(self.channels)).round()
            as usize
    }

    pub fn validate(&self) -> Result<(), PiperError> {
        if self.sample_rate == 0 {
            return Err(PiperError::Config("sample rate must be positive".to_string()));
        }
        if self.channels == 0 {
            return Err(PiperError::Config("channel count must be positive".to_string()));
        }
        if self.sample_width != 2 {
            return Err(PiperError::Config(format!(
                "unsupported sample width {} (only 16-bit output is produced)",
                self.sample_width
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub num_speakers: i64,
    pub speaker_id_map: Option<HashMap<String, SpeakerId>>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_speakers: 1,
            speaker_id_map: None,
        }
    }
}

impl ModelConfig {
    pub fn is_multi_speaker(&self) -> bool {
        self.num_speakers > 1
    }

    /// Look up a speaker by the name used in `speaker_id_map`.
    pub fn speaker_id(&self, name: &str) -> Option<SpeakerId> {
        self.speaker_id_map.as_ref()?.get(name).copied()
    }
}

/// Everything parsed from a voice's `.onnx.json` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceConfig {
    pub phonemize: PhonemizeConfig,
    pub synthesis: SynthesisConfig,
    pub model: ModelConfig,
}

impl VoiceConfig {
    /// Load and validate a voice config file.
    pub fn load(config_path: &Path) -> Result<Self, PiperError> {
        log::debug!("Parsing voice config at {}", config_path.display());
        let content = std::fs::read_to_string(config_path)?;
        Self::from_json_str(&content)
    }

    /// Parse and validate a voice config document.
    pub fn from_json_str(json: &str) -> Result<Self, PiperError> {
        let doc: ConfigDocument = serde_json::from_str(json)
            .map_err(|e| PiperError::Config(format!("Failed to parse JSON: {e}")))?;
        let config = Self {
            phonemize: parse_phonemize_config(&doc)?,
            synthesis: parse_synthesis_config(&doc)?,
            model: parse_model_config(&doc),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PiperError> {
        self.synthesis.validate()?;
        if self.model.num_speakers < 1 {
            return Err(PiperError::Config(format!(
                "num_speakers must be at least 1, got {}",
                self.model.num_speakers
            )));
        }
        Ok(())
    }

    /// Apply the speaker rule: single-speaker voices never carry a speaker id,
    /// multi-speaker voices use `speaker_id` or fall back to speaker 0.
    pub fn select_speaker(&mut self, speaker_id: Option<SpeakerId>) {
        if self.model.is_multi_speaker() {
            self.synthesis.speaker_id = Some(speaker_id.unwrap_or(0));
        } else {
            if let Some(id) = speaker_id {
                log::warn!("Voice has a single speaker; ignoring speaker id {id}");
            }
            self.synthesis.speaker_id = None;
        }
    }
}

// Raw shape of the document. Unknown fields are ignored since exported
// voices carry training metadata alongside these sections.
#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    espeak: Option<EspeakSection>,
    phoneme_type: Option<String>,
    phoneme_id_map: Option<HashMap<String, Vec<PhonemeId>>>,
    phoneme_map: Option<HashMap<String, Vec<String>>>,
    audio: Option<AudioSection>,
    inference: Option<InferenceSection>,
    num_speakers: Option<i64>,
    speaker_id_map: Option<HashMap<String, SpeakerId>>,
}

#[derive(Debug, Default, Deserialize)]
struct EspeakSection {
    voice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AudioSection {
    sample_rate: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct InferenceSection {
    noise_scale: Option<f32>,
    length_scale: Option<f32>,
    noise_w: Option<f32>,
    phoneme_silence: Option<HashMap<String, f32>>,
}

/// Decode a map key or value that must be exactly one codepoint.
pub fn single_codepoint(s: &str, table: &str) -> Result<Phoneme, PiperError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(ch),
        _ => {
            log::error!("\"{s}\" is not a single codepoint ({table})");
            Err(PiperError::Config(format!(
                "phoneme must be a single codepoint, got {s:?} in {table}"
            )))
        }
    }
}

fn parse_phonemize_config(doc: &ConfigDocument) -> Result<PhonemizeConfig, PiperError> {
    let mut config = PhonemizeConfig::default();

    if let Some(voice) = doc.espeak.as_ref().and_then(|e| e.voice.clone()) {
        config.espeak_voice = voice;
    }

    if doc.phoneme_type.as_deref() == Some("text") {
        config.phoneme_type = PhonemeType::Text;
    }

    if let Some(id_map) = &doc.phoneme_id_map {
        for (from, ids) in id_map {
            let phoneme = single_codepoint(from, "phoneme_id_map")?;
            config.phoneme_id_map.insert(phoneme, ids.clone());
        }
    }

    if let Some(map) = &doc.phoneme_map {
        let mut phoneme_map = PhonemeMap::new();
        for (from, to) in map {
            let from = single_codepoint(from, "phoneme_map")?;
            let to = to
                .iter()
                .map(|p| single_codepoint(p, "phoneme_map"))
                .collect::<Result<Vec<_>, _>>()?;
            phoneme_map.insert(from, to);
        }
        config.phoneme_map = Some(phoneme_map);
    }

    Ok(config)
}

fn parse_synthesis_config(doc: &ConfigDocument) -> Result<SynthesisConfig, PiperError> {
    let mut config = SynthesisConfig::default();

    if let Some(rate) = doc.audio.as_ref().and_then(|a| a.sample_rate) {
        config.sample_rate = rate;
    }

    if let Some(inference) = &doc.inference {
        if let Some(v) = inference.noise_scale {
            config.noise_scale = v;
        }
        if let Some(v) = inference.length_scale {
            config.length_scale = v;
        }
        if let Some(v) = inference.noise_w {
            config.noise_w = v;
        }
        if let Some(silence) = &inference.phoneme_silence {
            let mut table = HashMap::new();
            for (phoneme, seconds) in silence {
                table.insert(single_codepoint(phoneme, "phoneme_silence")?, *seconds);
            }
            config.phoneme_silence_seconds = Some(table);
        }
    }

    Ok(config)
}

fn parse_model_config(doc: &ConfigDocument) -> ModelConfig {
    ModelConfig {
        num_speakers: doc.num_speakers.unwrap_or(1),
        speaker_id_map: doc.speaker_id_map.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = VoiceConfig::from_json_str("{}").unwrap();
        assert_eq!(config, VoiceConfig::default());
        assert_eq!(config.model.num_speakers, 1);
        assert_eq!(config.synthesis.sample_rate, 22050);
        assert_eq!(config.synthesis.noise_scale, 0.667);
        assert_eq!(config.synthesis.length_scale, 1.0);
        assert_eq!(config.synthesis.noise_w, 0.8);
        assert_eq!(config.phonemize.phoneme_type, PhonemeType::Espeak);
        assert_eq!(config.phonemize.espeak_voice, "en-us");
        assert!(config.phonemize.phoneme_map.is_none());
    }

    #[test]
    fn parses_phonemize_section() {
        let config = VoiceConfig::from_json_str(
            r#"{
                "espeak": { "voice": "en-GB" },
                "phoneme_type": "text",
                "phoneme_id_map": { "A": [65, 0], "B": [66, 1] },
                "phoneme_map": { "C": ["X", "Y"] }
            }"#,
        )
        .unwrap();

        let p = &config.phonemize;
        assert_eq!(p.espeak_voice, "en-GB");
        assert_eq!(p.phoneme_type, PhonemeType::Text);
        assert_eq!(p.phoneme_id_map.len(), 2);
        assert_eq!(p.phoneme_id_map[&'A'], vec![65, 0]);
        assert_eq!(p.phoneme_id_map[&'B'], vec![66, 1]);
        assert_eq!(p.phoneme_map.as_ref().unwrap()[&'C'], vec!['X', 'Y']);
    }

    #[test]
    fn non_text_phoneme_type_means_espeak() {
        let config = VoiceConfig::from_json_str(r#"{"phoneme_type": "espeak"}"#).unwrap();
        assert_eq!(config.phonemize.phoneme_type, PhonemeType::Espeak);
    }

    #[test]
    fn parses_synthesis_section() {
        let config = VoiceConfig::from_json_str(
            r#"{
                "audio": { "sample_rate": 16000, "quality": "medium" },
                "inference": {
                    "noise_scale": 0.5,
                    "length_scale": 1,
                    "noise_w": 0.7,
                    "phoneme_silence": { "P": 0.1 }
                }
            }"#,
        )
        .unwrap();

        let s = &config.synthesis;
        assert_eq!(s.sample_rate, 16000);
        assert_eq!(s.noise_scale, 0.5);
        assert_eq!(s.length_scale, 1.0);
        assert_eq!(s.noise_w, 0.7);
        assert_eq!(s.phoneme_silence_seconds.as_ref().unwrap()[&'P'], 0.1);
    }

    #[test]
    fn parses_model_section() {
        let config = VoiceConfig::from_json_str(
            r#"{"num_speakers": 2, "speaker_id_map": {"speakerA": 0, "speakerB": 1}}"#,
        )
        .unwrap();
        assert_eq!(config.model.num_speakers, 2);
        assert_eq!(config.model.speaker_id("speakerB"), Some(1));
        assert_eq!(config.model.speaker_id("nobody"), None);
    }

    #[test]
    fn num_speakers_defaults_to_one() {
        let config =
            VoiceConfig::from_json_str(r#"{"speaker_id_map": {"speakerA": 0}}"#).unwrap();
        assert_eq!(config.model.num_speakers, 1);
        assert_eq!(config.model.speaker_id_map.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn accepts_multibyte_single_codepoints() {
        let config =
            VoiceConfig::from_json_str(r#"{"phoneme_id_map": {"ə": [59], "ˈ": [120]}}"#)
                .unwrap();
        assert_eq!(config.phonemize.phoneme_id_map[&'ə'], vec![59]);
        assert_eq!(config.phonemize.phoneme_id_map[&'ˈ'], vec![120]);
    }

    #[test]
    fn rejects_multi_codepoint_keys() {
        for doc in [
            r#"{"phoneme_id_map": {"ab": [1]}}"#,
            r#"{"phoneme_id_map": {"": [1]}}"#,
            r#"{"phoneme_map": {"tʃ": ["t"]}}"#,
            r#"{"phoneme_map": {"t": ["tʃ"]}}"#,
            r#"{"inference": {"phoneme_silence": {"..": 0.5}}}"#,
            // 'e' followed by a combining acute accent
            "{\"phoneme_id_map\": {\"e\u{0301}\": [3]}}",
        ] {
            let err = VoiceConfig::from_json_str(doc).unwrap_err();
            assert!(
                matches!(err, PiperError::Config(ref msg) if msg.contains("single codepoint")),
                "{doc} -> {err}"
            );
        }
    }

    #[test]
    fn rejects_wrongly_typed_fields() {
        for doc in [
            r#"{"num_speakers": "two"}"#,
            r#"{"audio": {"sample_rate": "fast"}}"#,
            r#"{"phoneme_id_map": {"a": "1"}}"#,
            r#"{"inference": {"noise_scale": [0.5]}}"#,
        ] {
            assert!(matches!(
                VoiceConfig::from_json_str(doc),
                Err(PiperError::Config(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let err = VoiceConfig::from_json_str(r#"{"audio": {"sample_rate": 0}}"#).unwrap_err();
        assert!(matches!(err, PiperError::Config(_)));
    }

    #[test]
    fn speaker_rule() {
        let mut single = VoiceConfig::default();
        single.select_speaker(Some(3));
        assert_eq!(single.synthesis.speaker_id, None);

        let mut multi = VoiceConfig::default();
        multi.model.num_speakers = 4;
        multi.select_speaker(None);
        assert_eq!(multi.synthesis.speaker_id, Some(0));
        multi.select_speaker(Some(3));
        assert_eq!(multi.synthesis.speaker_id, Some(3));
    }

    #[test]
    fn silence_sample_count_rounds() {
        let config = SynthesisConfigBuilder::default()
            .sample_rate(22050u32)
            .channels(2u16)
            .build()
            .unwrap();
        assert_eq!(config.silence_samples(0.2), 8820);
        assert_eq!(config.silence_samples(0.0), 0);
        assert_eq!(config.silence_samples(-1.0), 0);

        let odd = SynthesisConfigBuilder::default()
            .sample_rate(3u32)
            .build()
            .unwrap();
        assert_eq!(odd.silence_samples(0.5), 2);
    }

    #[test]
    fn builder_defaults_match_default() {
        let built = SynthesisConfigBuilder::default().build().unwrap();
        assert_eq!(built, SynthesisConfig::default());
        assert_eq!(built.bits_per_sample(), 16);
    }
}
