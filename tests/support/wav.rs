use std::f32::consts::PI;
use std::path::Path;

pub fn write_test_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Decaying 1 kHz blips on every beat.
pub fn click_track(bpm: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let total = (sample_rate as f32 * seconds) as usize;
    let beat = (60.0 / bpm * sample_rate as f32) as usize;
    let click_len = (sample_rate / 100) as usize;
    let mut samples = vec![0.0_f32; total];
    let mut start = 0;
    while start < total {
        for i in 0..click_len.min(total - start) {
            let decay = 1.0 - i as f32 / click_len as f32;
            samples[start + i] = (2.0 * PI * 1_000.0 * i as f32 / sample_rate as f32).sin() * decay;
        }
        start += beat;
    }
    samples
}
