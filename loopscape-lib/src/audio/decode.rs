//! Symphonia helpers for loading source clips as mono buffers.

use std::path::Path;

use log::warn;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::MixError;

use super::AudioBuffer;

/// Build a Symphonia `FormatReader` for the given file path.
pub fn open_reader(file_path: &str) -> Result<Box<dyn FormatReader>, MixError> {
    let src = std::fs::File::open(file_path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    // Probe hint from the file's extension.
    let mut hint = Hint::new();
    if let Some(extension) = Path::new(file_path).extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    Ok(probed.format)
}

/// Decode the first audio track of a file and downmix it to mono.
///
/// # Errors
/// Fails if the file cannot be opened or decoded, if its sample rate differs
/// from `sample_rate` (no resampling is performed), or if it decodes to zero
/// samples.
pub fn load_mono(file_path: &str, sample_rate: u32) -> Result<AudioBuffer, MixError> {
    let mut format = open_reader(file_path)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MixError::Decode(format!("no supported audio tracks in {}", file_path)))?;
    let track_id = track.id;

    if let Some(found) = track.codec_params.sample_rate {
        check_rate(file_path, sample_rate, found)?;
    }

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => {
                return Err(MixError::Decode(format!(
                    "decoder reset required while reading {}",
                    file_path
                )));
            }
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                check_rate(file_path, sample_rate, spec.rate)?;
                let channels = spec.channels.count().max(1);
                let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(decoded);
                downmix_into(&mut samples, interleaved.samples(), channels);
            }
            Err(Error::DecodeError(err)) => {
                warn!("decode error in {}: {}", file_path, err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if samples.is_empty() {
        return Err(MixError::EmptySource(file_path.to_string()));
    }

    Ok(AudioBuffer::new(sample_rate, samples))
}

fn check_rate(file_path: &str, expected: u32, found: u32) -> Result<(), MixError> {
    if found != expected {
        return Err(MixError::SampleRateMismatch {
            path: file_path.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Average interleaved frames down to a single channel.
fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
