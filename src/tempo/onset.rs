use std::f32::consts::PI;

use rustfft::{FftPlanner, num_complex::Complex};

use super::{TempoError, TempoEstimator};

const FRAME_SIZE: usize = 1024;
const HOP_SIZE: usize = 256;
const PRIOR_CENTER_BPM: f32 = 120.0;
const PRIOR_OCTAVE_WIDTH: f32 = 1.0;

/// Spectral-flux onset envelope followed by autocorrelation tempo picking.
///
/// Candidate lags are weighted by a log-normal prior centred on 120 BPM so octave errors prefer
/// the moderate tempo.
#[derive(Debug, Clone)]
pub struct OnsetTempoEstimator {
    pub min_bpm: f32,
    pub max_bpm: f32,
}

impl Default for OnsetTempoEstimator {
    fn default() -> Self {
        Self {
            min_bpm: 60.0,
            max_bpm: 200.0,
        }
    }
}

impl TempoEstimator for OnsetTempoEstimator {
    fn estimate_tempo(&self, mono: &[f32], sample_rate: u32) -> Result<f32, TempoError> {
        let envelope = onset_envelope(mono);
        let frame_rate = sample_rate.max(1) as f32 / HOP_SIZE as f32;
        let lag_min = ((60.0 * frame_rate / self.max_bpm).floor() as usize).max(1);
        let lag_max = (60.0 * frame_rate / self.min_bpm.max(1.0)).ceil() as usize;
        if envelope.len() < lag_max * 2 || lag_max <= lag_min {
            return Err(TempoError::TooShort {
                frames: envelope.len(),
            });
        }

        let acf: Vec<f32> = (0..=lag_max + 1)
            .map(|lag| autocorrelation(&envelope, lag))
            .collect();
        if acf[0] <= f32::EPSILON {
            return Err(TempoError::NoOnsets);
        }

        let mut best_lag = None;
        let mut best_score = 0.0_f32;
        for lag in lag_min..=lag_max {
            let bpm = 60.0 * frame_rate / lag as f32;
            let score = acf[lag] * tempo_prior(bpm);
            if score > best_score {
                best_score = score;
                best_lag = Some(lag);
            }
        }
        let lag = best_lag.ok_or(TempoError::NoOnsets)?;
        let refined = lag as f32 + parabolic_offset(acf[lag - 1], acf[lag], acf[lag + 1]);
        Ok(60.0 * frame_rate / refined)
    }
}

/// Half-wave rectified spectral flux of log magnitudes, mean removed.
fn onset_envelope(mono: &[f32]) -> Vec<f32> {
    if mono.len() < FRAME_SIZE {
        return Vec::new();
    }
    let window = hann_window(FRAME_SIZE);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(FRAME_SIZE);
    let bins = FRAME_SIZE / 2 + 1;
    let mut previous = vec![0.0_f32; bins];
    let mut current = vec![0.0_f32; bins];
    let mut buffer = vec![Complex::new(0.0, 0.0); FRAME_SIZE];
    let frames = (mono.len() - FRAME_SIZE) / HOP_SIZE + 1;
    let mut envelope = Vec::with_capacity(frames);

    for frame in 0..frames {
        let start = frame * HOP_SIZE;
        for (slot, (&sample, &w)) in buffer
            .iter_mut()
            .zip(mono[start..start + FRAME_SIZE].iter().zip(&window))
        {
            *slot = Complex::new(sample * w, 0.0);
        }
        fft.process(&mut buffer);
        for (mag, value) in current.iter_mut().zip(&buffer[..bins]) {
            *mag = (1.0 + 100.0 * value.norm()).ln();
        }
        let flux = if frame == 0 {
            0.0
        } else {
            current
                .iter()
                .zip(&previous)
                .map(|(c, p)| (c - p).max(0.0))
                .sum()
        };
        envelope.push(flux);
        std::mem::swap(&mut previous, &mut current);
    }

    let mean = envelope.iter().sum::<f32>() / envelope.len().max(1) as f32;
    for value in envelope.iter_mut() {
        *value -= mean;
    }
    envelope
}

fn autocorrelation(envelope: &[f32], lag: usize) -> f32 {
    if lag >= envelope.len() {
        return 0.0;
    }
    let overlap = envelope.len() - lag;
    let sum: f32 = envelope[..overlap]
        .iter()
        .zip(&envelope[lag..])
        .map(|(a, b)| a * b)
        .sum();
    sum / overlap as f32
}

fn tempo_prior(bpm: f32) -> f32 {
    let octaves = (bpm / PRIOR_CENTER_BPM).log2() / PRIOR_OCTAVE_WIDTH;
    (-0.5 * octaves * octaves).exp()
}

fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom >= 0.0 {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

fn hann_window(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0; length.max(1)];
    }
    let denom = (length - 1) as f32;
    (0..length)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / denom).cos()))
        .collect()
}
