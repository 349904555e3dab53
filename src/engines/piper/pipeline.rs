use std::collections::HashMap;

use crate::{SynthesisResult, SynthesizedAudio};

use super::config::{Phoneme, VoiceConfig};
use super::model::{InferenceEngine, PiperError};
use super::phoneme_ids::{ids_to_string, phonemes_to_ids, phonemes_to_string, MissingPhonemes};
use super::phonemizer::{Diacritizer, Phonemizer};
use super::synthesize::synthesize;

/// Drives text through phonemization, id mapping, and inference for one voice.
///
/// Sentences are processed in order, one at a time. Each sentence's audio is
/// peak-normalized on its own and followed by the configured sentence silence.
pub struct Pipeline<'a> {
    config: &'a VoiceConfig,
    phonemizer: &'a mut dyn Phonemizer,
    engine: &'a mut dyn InferenceEngine,
    diacritizer: Option<&'a mut dyn Diacritizer>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a VoiceConfig,
        phonemizer: &'a mut dyn Phonemizer,
        engine: &'a mut dyn InferenceEngine,
    ) -> Self {
        Self {
            config,
            phonemizer,
            engine,
            diacritizer: None,
        }
    }

    /// Run `diacritizer` over the text before phonemizing it.
    pub fn with_diacritizer(mut self, diacritizer: &'a mut dyn Diacritizer) -> Self {
        self.diacritizer = Some(diacritizer);
        self
    }

    /// Synthesize the whole text into one buffer.
    pub fn text_to_audio(&mut self, text: &str) -> Result<SynthesizedAudio, PiperError> {
        self.run(text, None)
    }

    /// Synthesize sentence by sentence, handing each sentence's audio
    /// (including its trailing silence) to `on_sentence`.
    ///
    /// The returned audio has no samples; its timings and missing phonemes
    /// cover the whole text.
    pub fn text_to_audio_streaming(
        &mut self,
        text: &str,
        on_sentence: &mut dyn FnMut(&[i16]),
    ) -> Result<SynthesizedAudio, PiperError> {
        self.run(text, Some(on_sentence))
    }

    fn run(
        &mut self,
        text: &str,
        mut on_sentence: Option<&mut dyn FnMut(&[i16])>,
    ) -> Result<SynthesizedAudio, PiperError> {
        let config = self.config;
        let synthesis = &config.synthesis;
        let sentence_silence = synthesis.silence_samples(synthesis.sentence_silence_seconds);

        let text = match self.diacritizer.as_deref_mut() {
            Some(diacritizer) => {
                log::debug!("Diacritizing text: {text}");
                diacritizer.diacritize(text)?
            }
            None => text.to_string(),
        };

        log::debug!("Phonemizing text: {text}");
        let sentences = self.phonemizer.phonemize(&text, &config.phonemize)?;

        let mut audio: Vec<i16> = Vec::new();
        let mut total = SynthesisResult::default();
        let mut missing = MissingPhonemes::new();

        for sentence in sentences.iter().filter(|s| !s.is_empty()) {
            for (phrase, silence_seconds) in
                split_phrases(sentence, synthesis.phoneme_silence_seconds.as_ref())
            {
                if phrase.is_empty() {
                    continue;
                }

                log::debug!(
                    "Converting {} phoneme(s) to ids: {}",
                    phrase.len(),
                    phonemes_to_string(phrase)
                );
                let mapped = phonemes_to_ids(phrase, &config.phonemize);
                log::debug!(
                    "Converted {} phoneme(s) to {} phoneme id(s): {}",
                    phrase.len(),
                    mapped.ids.len(),
                    ids_to_string(&mapped.ids)
                );
                missing.merge(&mapped.missing);

                let phrase_result = synthesize(&mapped.ids, synthesis, self.engine, &mut audio)?;
                total.add(&phrase_result);

                let phrase_silence = synthesis.silence_samples(silence_seconds);
                audio.resize(audio.len() + phrase_silence, 0);
            }

            audio.resize(audio.len() + sentence_silence, 0);

            if let Some(callback) = on_sentence.as_deref_mut() {
                callback(audio.as_slice());
                audio.clear();
            }
        }

        total.update_real_time_factor();
        missing.report();

        Ok(SynthesizedAudio {
            samples: audio,
            sample_rate: synthesis.sample_rate,
            channels: synthesis.channels,
            bits_per_sample: synthesis.bits_per_sample(),
            result: total,
            missing_phonemes: missing,
        })
    }
}

/// Split a sentence after every phoneme that has its own silence.
///
/// Each phrase is paired with the silence (in seconds) that follows it; the
/// final phrase gets none and may be empty.
fn split_phrases<'p>(
    sentence: &'p [Phoneme],
    phoneme_silence: Option<&HashMap<Phoneme, f32>>,
) -> Vec<(&'p [Phoneme], f32)> {
    let Some(silence) = phoneme_silence else {
        return vec![(sentence, 0.0)];
    };

    let mut phrases = Vec::new();
    let mut start = 0;
    for (i, phoneme) in sentence.iter().enumerate() {
        if let Some(&seconds) = silence.get(phoneme) {
            phrases.push((&sentence[start..=i], seconds));
            start = i + 1;
        }
    }
    phrases.push((&sentence[start..], 0.0));
    phrases
}
