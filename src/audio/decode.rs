use std::io::Cursor;
use std::path::{Path, PathBuf};

use hound::SampleFormat;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use thiserror::Error;

use super::AudioBuffer;

/// Errors raised while turning stored audio into PCM.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be read from disk.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Neither the WAV reader nor the container probe recognised the data.
    #[error("Unsupported audio format: {message}")]
    UnsupportedFormat { message: String },
    /// The container parsed but held no sample frames.
    #[error("Audio decoded to zero samples")]
    EmptyAudio,
    /// A WAV sample could not be read.
    #[error("Sample error: {source}")]
    Sample { source: hound::Error },
}

/// Decode an audio file into interleaved `f32` samples.
///
/// WAV goes through `hound`; anything it rejects is retried through symphonia using the file
/// extension as a probe hint.
pub fn decode_file(path: &Path) -> Result<AudioBuffer, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let hint = path.extension().and_then(|ext| ext.to_str());
    decode_bytes(bytes, hint)
}

/// Decode in-memory audio bytes. `extension_hint` helps symphonia pick a demuxer.
pub fn decode_bytes(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<AudioBuffer, DecodeError> {
    let buffer = match decode_wav(&bytes)? {
        Some(buffer) => buffer,
        None => decode_with_symphonia(bytes, extension_hint)?,
    };
    if buffer.is_empty() {
        return Err(DecodeError::EmptyAudio);
    }
    Ok(buffer)
}

fn decode_wav(bytes: &[u8]) -> Result<Option<AudioBuffer>, DecodeError> {
    let mut reader = match hound::WavReader::new(Cursor::new(bytes)) {
        Ok(reader) => reader,
        Err(_) => return Ok(None),
    };
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => read_float_samples(&mut reader)?,
        SampleFormat::Int => read_int_samples(&mut reader, spec.bits_per_sample)?,
    };
    Ok(Some(AudioBuffer {
        samples,
        sample_rate: spec.sample_rate.max(1),
        channels: spec.channels.max(1),
    }))
}

fn read_float_samples(reader: &mut hound::WavReader<Cursor<&[u8]>>) -> Result<Vec<f32>, DecodeError> {
    reader
        .samples::<f32>()
        .map(|s| s.map_err(|source| DecodeError::Sample { source }))
        .collect()
}

fn read_int_samples(
    reader: &mut hound::WavReader<Cursor<&[u8]>>,
    bits_per_sample: u16,
) -> Result<Vec<f32>, DecodeError> {
    let scale = (1i64 << bits_per_sample.saturating_sub(1)).max(1) as f32;
    reader
        .samples::<i32>()
        .map(|s| {
            s.map(|v| v as f32 / scale)
                .map_err(|source| DecodeError::Sample { source })
        })
        .collect()
}

fn decode_with_symphonia(
    bytes: Vec<u8>,
    extension_hint: Option<&str>,
) -> Result<AudioBuffer, DecodeError> {
    let unsupported = |message: String| DecodeError::UnsupportedFormat { message };
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| unsupported(format!("probe failed: {err}")))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| unsupported("no default track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track
        .codec_params
        .channels
        .map(|channels| channels.count() as u16);
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| unsupported(format!("no decoder: {err}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(unsupported(format!("packet read failed: {err}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(unsupported(format!("decode failed: {err}"))),
        };
        let spec = *audio_buf.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    let sample_rate = sample_rate.ok_or_else(|| unsupported("missing sample rate".to_string()))?;
    Ok(AudioBuffer {
        samples,
        sample_rate: sample_rate.max(1),
        channels: channels.unwrap_or(1).max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes_int(bits_per_sample: u16, channels: u16, samples: &[i32]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 48_000,
            bits_per_sample,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("create wav writer");
            for &sample in samples {
                writer.write_sample(sample).expect("write sample");
            }
            writer.finalize().expect("finalize wav");
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_16bit_int_scaling_and_interleaving() {
        let scale = (1i64 << 15) as f32;
        let bytes = wav_bytes_int(16, 2, &[0, i16::MAX as i32, i16::MIN as i32, 1, -1, 0]);

        let decoded = decode_bytes(bytes, Some("wav")).expect("decode 16-bit wav");

        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 48_000);
        let expected = [
            0.0,
            i16::MAX as f32 / scale,
            i16::MIN as f32 / scale,
            1.0 / scale,
            -1.0 / scale,
            0.0,
        ];
        assert_eq!(decoded.samples.len(), expected.len());
        for (got, exp) in decoded.samples.iter().zip(expected) {
            assert!((got - exp).abs() < 1e-6, "got {got}, expected {exp}");
        }
    }

    #[test]
    fn decodes_24bit_int_scaling() {
        let scale = (1i64 << 23) as f32;
        let max_pos = (scale as i32) - 1;
        let bytes = wav_bytes_int(24, 1, &[0, max_pos, -(scale as i32)]);

        let decoded = decode_bytes(bytes, None).expect("decode 24-bit wav");

        assert!((decoded.samples[1] - max_pos as f32 / scale).abs() < 1e-6);
        assert!((decoded.samples[2] + 1.0).abs() < 1e-6);
    }

    /// Minimal mono 16-bit AIFF: FORM header, COMM with an 80-bit extended rate, SSND.
    fn aiff_bytes_i16(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let exponent = 31 - sample_rate.leading_zeros();
        let mut comm = Vec::with_capacity(18);
        comm.extend_from_slice(&1u16.to_be_bytes());
        comm.extend_from_slice(&(samples.len() as u32).to_be_bytes());
        comm.extend_from_slice(&16u16.to_be_bytes());
        comm.extend_from_slice(&(16_383 + exponent as u16).to_be_bytes());
        comm.extend_from_slice(&((sample_rate as u64) << (63 - exponent)).to_be_bytes());

        let mut ssnd = vec![0u8; 8];
        for sample in samples {
            ssnd.extend_from_slice(&sample.to_be_bytes());
        }

        let mut bytes = b"FORM".to_vec();
        let form_len = 4 + 8 + comm.len() + 8 + ssnd.len();
        bytes.extend_from_slice(&(form_len as u32).to_be_bytes());
        bytes.extend_from_slice(b"AIFF");
        for (id, body) in [(b"COMM", &comm), (b"SSND", &ssnd)] {
            bytes.extend_from_slice(id);
            bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
            bytes.extend_from_slice(body);
        }
        bytes
    }

    #[test]
    fn aiff_decodes_through_symphonia_fallback() {
        let samples: Vec<i16> = (0..800).map(|i| if i % 2 == 0 { 16_384 } else { -16_384 }).collect();
        let bytes = aiff_bytes_i16(8_000, &samples);

        let decoded = decode_bytes(bytes, Some("aiff")).expect("decode aiff");

        assert_eq!(decoded.sample_rate, 8_000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 800);
        assert!((decoded.samples[0] - 0.5).abs() < 1e-4);
        assert!((decoded.samples[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn garbage_bytes_are_unsupported() {
        let err = decode_bytes(vec![0, 1, 2, 3, 4, 5], Some("wav")).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat { .. }));
    }

    #[test]
    fn wav_without_frames_is_empty_audio() {
        let bytes = wav_bytes_int(16, 1, &[]);
        let err = decode_bytes(bytes, Some("wav")).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyAudio));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_file(&dir.path().join("absent.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::Read { .. }));
    }
}
