use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const FADE_SECS: f32 = 0.005;
const AMPLITUDE: f32 = 0.25;

/// A finite mono sine tone with a short fade at both ends to avoid clicks.
/// A frequency of zero yields silence, used for gaps between tones.
pub struct Chime {
    freq: f32,
    num_sample: usize,
    total_samples: usize,
}

impl Chime {
    pub fn new(freq: f32, duration: Duration) -> Self {
        Self {
            freq,
            num_sample: 0,
            total_samples: (duration.as_micros() * u128::from(SAMPLE_RATE) / 1_000_000) as usize,
        }
    }

    fn envelope(&self, t: f32, total: f32) -> f32 {
        let fade_in = (t / FADE_SECS).min(1.0);
        let fade_out = ((total - t) / FADE_SECS).min(1.0);
        fade_in.min(fade_out).max(0.0)
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let total = self.total_samples as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;

        let sample = (2.0 * PI * self.freq * t).sin();
        Some(sample * AMPLITUDE * self.envelope(t, total))
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}
