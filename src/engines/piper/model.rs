#[cfg(feature = "onnx")]
use std::path::Path;

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::execution_providers::CPUExecutionProvider;
#[cfg(feature = "onnx")]
use ort::inputs;
#[cfg(feature = "onnx")]
use ort::session::builder::GraphOptimizationLevel;
#[cfg(feature = "onnx")]
use ort::session::Session;
#[cfg(feature = "onnx")]
use ort::value::TensorRef;

use super::config::{PhonemeId, SpeakerId};

#[derive(thiserror::Error, Debug)]
pub enum PiperError {
    #[cfg(feature = "onnx")]
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "onnx")]
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Invalid voice config: {0}")]
    Config(String),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    Phonemization(String),
    #[error("Diacritization failed: {0}")]
    Diacritization(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model not loaded. Call load_model() first.")]
    ModelNotLoaded,
}

/// Inputs for one call into the vocoder.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest<'a> {
    pub phoneme_ids: &'a [PhonemeId],
    /// `[noise_scale, length_scale, noise_w]`, in that order.
    pub scales: [f32; 3],
    /// Only set for multi-speaker voices.
    pub speaker_id: Option<SpeakerId>,
}

impl InferenceRequest<'_> {
    pub fn input_length(&self) -> i64 {
        self.phoneme_ids.len() as i64
    }
}

/// A neural vocoder that turns phoneme ids into raw float audio.
///
/// Calls take `&mut self`: a single session is not re-entrant, so callers
/// sharing one voice across threads must serialize access themselves.
pub trait InferenceEngine {
    /// Whether a session is available to serve `infer`.
    fn is_ready(&self) -> bool {
        true
    }

    /// Run the model and return the flat waveform.
    fn infer(&mut self, request: &InferenceRequest<'_>) -> Result<Vec<f32>, PiperError>;
}

/// Piper VITS model backed by an ONNX Runtime session.
#[cfg(feature = "onnx")]
pub struct OnnxModel {
    session: Session,
    /// True if the graph declares a `sid` input (multi-speaker export).
    has_speaker_input: bool,
}

#[cfg(feature = "onnx")]
impl OnnxModel {
    /// Open an exported Piper `.onnx` model.
    pub fn load(onnx_path: &Path, num_threads: Option<usize>) -> Result<Self, PiperError> {
        log::info!("Loading Piper model from {}", onnx_path.display());
        let start = std::time::Instant::now();

        let session = init_session(onnx_path, num_threads)?;
        let has_speaker_input = detect_speaker_input(&session);

        log::debug!(
            "Loaded onnx model in {:.3} second(s), has_speaker_input={}",
            start.elapsed().as_secs_f64(),
            has_speaker_input
        );

        Ok(Self {
            session,
            has_speaker_input,
        })
    }
}

#[cfg(feature = "onnx")]
impl InferenceEngine for OnnxModel {
    fn infer(&mut self, request: &InferenceRequest<'_>) -> Result<Vec<f32>, PiperError> {
        let ids = request.phoneme_ids;
        let ids_arr = Array2::from_shape_vec((1, ids.len()), ids.to_vec())?;
        let lengths_arr = ndarray::arr1(&[request.input_length()]);
        let scales_arr = ndarray::arr1(&request.scales);

        let speaker_id = match request.speaker_id {
            Some(sid) if !self.has_speaker_input => {
                log::warn!("Model has no 'sid' input; ignoring speaker id {sid}");
                None
            }
            other => other,
        };

        // Output tensors borrow the session; copy the waveform out before
        // they are dropped at the end of this scope.
        let output = if let Some(sid) = speaker_id {
            let sid_arr = ndarray::arr1(&[sid]);
            let inputs = inputs![
                "input" => TensorRef::from_array_view(ids_arr.view())?,
                "input_lengths" => TensorRef::from_array_view(lengths_arr.view())?,
                "scales" => TensorRef::from_array_view(scales_arr.view())?,
                "sid" => TensorRef::from_array_view(sid_arr.view())?,
            ];
            self.session.run(inputs)?
        } else {
            let inputs = inputs![
                "input" => TensorRef::from_array_view(ids_arr.view())?,
                "input_lengths" => TensorRef::from_array_view(lengths_arr.view())?,
                "scales" => TensorRef::from_array_view(scales_arr.view())?,
            ];
            self.session.run(inputs)?
        };

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| PiperError::Inference("No output tensor from model".to_string()))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}

/// Initialize an ONNX session the way Piper voices expect.
///
/// Graph optimization is disabled: it roughly doubles load time for VITS
/// exports without a measurable inference gain.
#[cfg(feature = "onnx")]
fn init_session(onnx_path: &Path, num_threads: Option<usize>) -> Result<Session, PiperError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Disable)?
        .with_execution_providers(providers)?;

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

#[cfg(feature = "onnx")]
fn detect_speaker_input(session: &Session) -> bool {
    session.inputs().iter().any(|input| input.name() == "sid")
}
