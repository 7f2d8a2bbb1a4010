//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;

use teller_gateway::voice::{SAMPLE_RATE, UtteranceRecorder, samples_to_wav};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

#[test]
fn test_recorder_captures_one_utterance() {
    let mut recorder = UtteranceRecorder::new();

    assert!(!recorder.is_recording());
    assert!(recorder.start());
    assert!(recorder.is_recording());

    let chunk1 = generate_sine_samples(440.0, 0.2, 0.3);
    let chunk2 = generate_sine_samples(440.0, 0.3, 0.3);
    recorder.push(&chunk1);
    recorder.push(&chunk2);

    let utterance = recorder.stop().expect("recording was active");
    assert!(!recorder.is_recording());
    assert_eq!(utterance.samples().len(), chunk1.len() + chunk2.len());
    assert!((utterance.duration_secs() - 0.5).abs() < 0.01);
}

#[test]
fn test_recorder_ignores_double_start() {
    let mut recorder = UtteranceRecorder::new();

    assert!(recorder.start());
    recorder.push(&generate_sine_samples(440.0, 0.1, 0.3));

    // A second tap on the mic button must not discard the take
    assert!(!recorder.start());
    assert!(recorder.is_recording());

    let utterance = recorder.stop().expect("recording was active");
    assert!(!utterance.samples().is_empty());
}

#[test]
fn test_recorder_stop_while_idle_yields_nothing() {
    let mut recorder = UtteranceRecorder::new();
    assert!(recorder.stop().is_none());

    // And stays reusable afterwards
    assert!(recorder.start());
    assert!(recorder.stop().is_some());
}

#[test]
fn test_utterance_encodes_as_wav_upload() {
    let mut recorder = UtteranceRecorder::new();
    recorder.start();
    recorder.push(&generate_sine_samples(440.0, 0.1, 0.5));

    let wav_data = recorder
        .stop()
        .expect("recording was active")
        .into_wav()
        .unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    // Read WAV back
    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());

    // Full-scale float maps to full-scale PCM
    assert_eq!(*read_samples.iter().max().unwrap(), i16::MAX);
}

#[test]
fn test_wav_preserves_amplitude() {
    let samples = generate_sine_samples(440.0, 0.05, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();
    let peak = reader
        .samples::<i16>()
        .map(|s| i32::from(s.unwrap()).abs())
        .max()
        .unwrap();

    // A 0.5 amplitude sine should peak around half of i16 range
    let half_scale = i32::from(i16::MAX) / 2;
    assert!((peak - half_scale).abs() < 200, "peak was {peak}");
}
