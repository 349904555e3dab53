use std::time::Instant;

use crate::SynthesisResult;

use super::config::{PhonemeId, SynthesisConfig};
use super::model::{InferenceEngine, InferenceRequest, PiperError};

/// Maximum value for a 16-bit signed WAV sample.
pub const MAX_WAV_VALUE: f32 = 32767.0;

/// Peaks below this are treated as this value so near-silence is not
/// amplified into noise.
pub const MIN_PEAK: f32 = 0.01;

/// Run the model on one sentence's ids and quantize its output.
///
/// Appends the 16-bit samples to `audio` and returns the timings for this
/// sentence alone.
pub fn synthesize(
    phoneme_ids: &[PhonemeId],
    config: &SynthesisConfig,
    engine: &mut dyn InferenceEngine,
    audio: &mut Vec<i16>,
) -> Result<SynthesisResult, PiperError> {
    if !engine.is_ready() {
        return Err(PiperError::Inference(
            "inference session is not initialized".to_string(),
        ));
    }

    log::debug!("Synthesizing audio for {} phoneme id(s)", phoneme_ids.len());

    let request = InferenceRequest {
        phoneme_ids,
        scales: [config.noise_scale, config.length_scale, config.noise_w],
        speaker_id: config.speaker_id,
    };

    let start = Instant::now();
    let waveform = engine.infer(&request)?;
    let infer_seconds = start.elapsed().as_secs_f64();

    let audio_seconds = waveform.len() as f64 / f64::from(config.sample_rate);
    let result = SynthesisResult::from_seconds(infer_seconds, audio_seconds);
    log::debug!(
        "Synthesized {:.3} second(s) of audio in {:.3} second(s)",
        result.audio_seconds,
        result.infer_seconds
    );

    audio.reserve(waveform.len());
    audio.extend(normalize_to_i16(&waveform));

    Ok(result)
}

/// Scale samples so the loudest one reaches full 16-bit range.
///
/// Each call normalizes independently, so consecutive sentences can differ in
/// loudness.
pub fn normalize_to_i16(samples: &[f32]) -> impl Iterator<Item = i16> + '_ {
    let peak = samples
        .iter()
        .fold(MIN_PEAK, |max, &s| if s.abs() > max { s.abs() } else { max });
    let scale = MAX_WAV_VALUE / peak;

    // `as` truncates toward zero; the clamp keeps it within i16.
    samples
        .iter()
        .map(move |&s| (s * scale).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::piper::config::SynthesisConfigBuilder;

    struct FakeModel {
        waveform: Vec<f32>,
        ready: bool,
        calls: Vec<(Vec<PhonemeId>, [f32; 3], Option<i64>)>,
    }

    impl FakeModel {
        fn returning(waveform: Vec<f32>) -> Self {
            Self {
                waveform,
                ready: true,
                calls: Vec::new(),
            }
        }
    }

    impl InferenceEngine for FakeModel {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn infer(&mut self, request: &InferenceRequest<'_>) -> Result<Vec<f32>, PiperError> {
            self.calls.push((
                request.phoneme_ids.to_vec(),
                request.scales,
                request.speaker_id,
            ));
            Ok(self.waveform.clone())
        }
    }

    #[test]
    fn peak_is_scaled_to_full_range() {
        let samples: Vec<i16> = normalize_to_i16(&[0.5, -0.25, 0.0, -0.5]).collect();
        assert_eq!(samples, vec![32767, -16383, 0, -32767]);
    }

    #[test]
    fn silence_stays_silent() {
        let samples: Vec<i16> = normalize_to_i16(&[0.0; 64]).collect();
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn quiet_audio_is_not_amplified_past_floor() {
        // Peak below 0.01 uses the floor, so 0.005 maps to half scale.
        let samples: Vec<i16> = normalize_to_i16(&[0.005]).collect();
        assert_eq!(samples, vec![16383]);
    }

    #[test]
    fn passes_scales_in_order_and_speaker() {
        let config = SynthesisConfigBuilder::default()
            .noise_scale(0.3f32)
            .length_scale(1.5f32)
            .noise_w(0.9f32)
            .speaker_id(4)
            .build()
            .unwrap();
        let mut model = FakeModel::returning(vec![0.1, -0.2]);
        let mut audio = Vec::new();

        synthesize(&[1, 0, 2], &config, &mut model, &mut audio).unwrap();

        assert_eq!(model.calls.len(), 1);
        let (ids, scales, speaker) = &model.calls[0];
        assert_eq!(ids, &vec![1, 0, 2]);
        assert_eq!(scales, &[0.3, 1.5, 0.9]);
        assert_eq!(*speaker, Some(4));
    }

    #[test]
    fn appends_to_existing_buffer_and_reports_duration() {
        let config = SynthesisConfigBuilder::default()
            .sample_rate(4u32)
            .build()
            .unwrap();
        let mut model = FakeModel::returning(vec![1.0, -1.0]);
        let mut audio = vec![7i16];

        let result = synthesize(&[1, 2], &config, &mut model, &mut audio).unwrap();

        assert_eq!(audio, vec![7, 32767, -32767]);
        assert_eq!(result.audio_seconds, 0.5);
        assert!(result.infer_seconds >= 0.0);
    }

    #[test]
    fn empty_output_gives_zero_real_time_factor() {
        let config = SynthesisConfig::default();
        let mut model = FakeModel::returning(Vec::new());
        let mut audio = Vec::new();

        let result = synthesize(&[1, 2], &config, &mut model, &mut audio).unwrap();
        assert!(audio.is_empty());
        assert_eq!(result.audio_seconds, 0.0);
        assert_eq!(result.real_time_factor, 0.0);
    }

    #[test]
    fn not_ready_is_an_inference_error() {
        let mut model = FakeModel::returning(vec![0.1]);
        model.ready = false;
        let mut audio = Vec::new();

        let err = synthesize(&[1, 2], &SynthesisConfig::default(), &mut model, &mut audio)
            .unwrap_err();
        assert!(matches!(err, PiperError::Inference(_)));
        assert!(model.calls.is_empty());
    }
}
