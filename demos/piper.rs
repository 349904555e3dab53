use std::path::PathBuf;
use std::time::Instant;

use piper_rs::{
    engines::piper::{PiperEngine, PiperInferenceParams, PiperModelParams},
    SynthesisEngine,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut engine = PiperEngine::new();
    let model_path = PathBuf::from("models/en_US-lessac-medium.onnx");

    let load_start = Instant::now();
    engine.load_model_with_params(&model_path, PiperModelParams::default())?;
    println!("Model loaded in {:.2?}", load_start.elapsed());

    if let Some(voice) = engine.voice() {
        println!("Available speakers: {:?}", voice.list_speakers());
    }

    let text = "Hello! This is Piper, a fast local neural text to speech system. \
                Each sentence is synthesized on its own and joined with a short pause.";

    let params = PiperInferenceParams {
        length_scale: Some(1.0),
        ..Default::default()
    };

    let synth_start = Instant::now();
    let audio = engine.synthesize(text, Some(params))?;
    let synth_dur = synth_start.elapsed();

    println!(
        "Synthesized {:.2}s audio in {:.2?} (real-time factor {:.3})",
        audio.duration_secs(),
        synth_dur,
        audio.result.real_time_factor
    );
    for (phoneme, count) in audio.missing_phonemes.iter() {
        println!("Missing phoneme {phoneme:?}: {count} time(s)");
    }

    let mut sentences = 0;
    engine.synthesize_streaming(text, None, &mut |samples: &[i16]| {
        sentences += 1;
        println!("Sentence {sentences}: {} samples", samples.len());
    })?;

    engine.synthesize_to_file(text, &PathBuf::from("output.wav"), None)?;
    println!("Saved to output.wav");

    engine.unload_model();
    Ok(())
}
