//! Audio types and device pipelines.

pub mod capture;
pub mod pcm;
pub mod playback;

/// Sample rate for microphone capture.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of model-generated speech.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Fixed capture frame size in samples (256 ms at 16 kHz).
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;

/// MIME-style format descriptor attached to every outbound frame.
pub const CAPTURE_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// A fixed block of mono audio samples at a declared sample rate.
///
/// Immutable once produced; ownership transfers from producer to consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Frame duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
