//! Utterance recording state machine
//!
//! Holds the start/stop lifecycle of one spoken utterance independently
//! of any audio backend. A boolean guard keeps exactly one recording
//! active per instance: starting again while recording changes nothing,
//! matching how the web client debounces its microphone button.

use super::{SAMPLE_RATE, samples_to_wav};
use crate::error::Result;

/// Samples captured between one `start` and `stop` pair
#[derive(Debug, Clone)]
pub struct RecordedUtterance {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl RecordedUtterance {
    /// The captured samples
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Recording length in seconds
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let count = self.samples.len() as f32;
        #[allow(clippy::cast_precision_loss)]
        let rate = self.sample_rate as f32;
        count / rate
    }

    /// Encode the utterance as 16-bit PCM WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn into_wav(self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }
}

/// Start/stop recorder for a single utterance at a time
pub struct UtteranceRecorder {
    recording: bool,
    samples: Vec<f32>,
    sample_rate: u32,
}

impl UtteranceRecorder {
    /// Create a recorder at the standard capture rate
    #[must_use]
    pub fn new() -> Self {
        Self::with_sample_rate(SAMPLE_RATE)
    }

    /// Create a recorder for a non-standard sample rate
    #[must_use]
    pub const fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            recording: false,
            samples: Vec::new(),
            sample_rate,
        }
    }

    /// Begin recording
    ///
    /// Returns `false` without touching state when a recording is already
    /// active.
    pub fn start(&mut self) -> bool {
        if self.recording {
            tracing::debug!("recording already active, ignoring start");
            return false;
        }
        self.recording = true;
        self.samples.clear();
        true
    }

    /// Append captured samples; ignored while not recording
    pub fn push(&mut self, samples: &[f32]) {
        if self.recording {
            self.samples.extend_from_slice(samples);
        }
    }

    /// Finish the recording and take the accumulated utterance
    ///
    /// Returns `None` when no recording is active.
    pub fn stop(&mut self) -> Option<RecordedUtterance> {
        if !self.recording {
            return None;
        }
        self.recording = false;
        let samples = std::mem::take(&mut self.samples);
        tracing::debug!(samples = samples.len(), "recording stopped");
        Some(RecordedUtterance {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    /// Whether a recording is active
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }
}

impl Default for UtteranceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_idempotent_while_recording() {
        let mut recorder = UtteranceRecorder::new();
        assert!(recorder.start());
        recorder.push(&[0.1, 0.2]);

        // second start must not clear what was captured
        assert!(!recorder.start());
        recorder.push(&[0.3]);

        let utterance = recorder.stop().unwrap();
        assert_eq!(utterance.samples().len(), 3);
    }

    #[test]
    fn stop_without_start_returns_none() {
        let mut recorder = UtteranceRecorder::new();
        assert!(recorder.stop().is_none());
    }

    #[test]
    fn push_while_idle_is_ignored() {
        let mut recorder = UtteranceRecorder::new();
        recorder.push(&[0.5; 100]);
        assert!(recorder.start());
        let utterance = recorder.stop().unwrap();
        assert!(utterance.samples().is_empty());
    }

    #[test]
    fn recorder_can_be_reused_after_stop() {
        let mut recorder = UtteranceRecorder::new();
        assert!(recorder.start());
        recorder.push(&[0.1; 10]);
        assert!(recorder.stop().is_some());

        assert!(recorder.start());
        recorder.push(&[0.2; 5]);
        assert_eq!(recorder.stop().unwrap().samples().len(), 5);
    }

    #[test]
    fn utterance_reports_duration() {
        let mut recorder = UtteranceRecorder::with_sample_rate(16000);
        recorder.start();
        recorder.push(&vec![0.0; 16000]);
        let utterance = recorder.stop().unwrap();
        assert!((utterance.duration_secs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn utterance_encodes_to_wav() {
        let mut recorder = UtteranceRecorder::new();
        recorder.start();
        recorder.push(&[0.0; 1600]);
        let wav = recorder.stop().unwrap().into_wav().unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
    }
}
