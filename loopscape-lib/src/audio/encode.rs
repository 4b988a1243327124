//! Incremental output writers.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{WavSpec, WavWriter};
use log::warn;

use crate::config::SampleEncoding;
use crate::error::MixError;

use super::AudioBuffer;

/// Destination for rendered frames.
pub trait FrameSink {
    /// Append one frame of mono samples.
    fn write_frame(&mut self, frame: &[f32]) -> Result<(), MixError>;
}

/// Collect frames in memory, one `Vec` per written frame.
impl FrameSink for Vec<Vec<f32>> {
    fn write_frame(&mut self, frame: &[f32]) -> Result<(), MixError> {
        self.push(frame.to_vec());
        Ok(())
    }
}

/// Output container chosen from the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Wav,
}

impl OutputFormat {
    /// Pick a container from the file extension, falling back to WAV.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("wav") | Some("wave") => OutputFormat::Wav,
            other => {
                warn!(
                    "unsupported output extension {:?} for {}, writing WAV",
                    other,
                    path.display()
                );
                OutputFormat::Wav
            }
        }
    }
}

/// Mono WAV writer that is finalized on drop if [`WavSink::finalize`] is never
/// reached.
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    encoding: SampleEncoding,
    samples_written: u64,
}

impl WavSink {
    /// Create the output file (and its parent directory).
    pub fn create(
        path: impl AsRef<Path>,
        sample_rate: u32,
        encoding: SampleEncoding,
    ) -> Result<Self, MixError> {
        let path = path.as_ref();
        let format = OutputFormat::from_path(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let spec = match (format, encoding) {
            (OutputFormat::Wav, SampleEncoding::Float32) => WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
            (OutputFormat::Wav, SampleEncoding::Pcm16) => WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
        };

        let writer = WavWriter::create(path, spec)?;
        Ok(Self {
            writer: Some(writer),
            encoding,
            samples_written: 0,
        })
    }

    /// Flush the header and close the file.
    ///
    /// # Returns
    /// Number of samples written.
    pub fn finalize(mut self) -> Result<u64, MixError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(self.samples_written)
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl FrameSink for WavSink {
    fn write_frame(&mut self, frame: &[f32]) -> Result<(), MixError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(MixError::Encode("writer already finalized".to_string()));
        };
        match self.encoding {
            SampleEncoding::Float32 => {
                for &sample in frame {
                    writer.write_sample(sample)?;
                }
            }
            SampleEncoding::Pcm16 => {
                for &sample in frame {
                    writer.write_sample(to_pcm16(sample))?;
                }
            }
        }
        self.samples_written += frame.len() as u64;
        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.finalize() {
                warn!("failed to finalize output: {}", err);
            }
        }
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Write a whole buffer to a WAV file in one pass.
pub fn write_buffer(
    path: impl AsRef<Path>,
    buffer: &AudioBuffer,
    encoding: SampleEncoding,
) -> Result<u64, MixError> {
    let mut sink = WavSink::create(path, buffer.sample_rate, encoding)?;
    sink.write_frame(&buffer.samples)?;
    sink.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_falls_back_to_wav() {
        assert_eq!(OutputFormat::from_path(Path::new("a.WAV")), OutputFormat::Wav);
        assert_eq!(OutputFormat::from_path(Path::new("a.flac")), OutputFormat::Wav);
        assert_eq!(OutputFormat::from_path(Path::new("noext")), OutputFormat::Wav);
    }

    #[test]
    fn frames_are_written_incrementally() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("out.wav");
        let mut sink = WavSink::create(&path, 100, SampleEncoding::Float32).expect("create");
        sink.write_frame(&[0.5; 100]).expect("frame 1");
        sink.write_frame(&[-0.25; 40]).expect("frame 2");
        assert_eq!(sink.finalize().expect("finalize"), 140);

        let mut reader = hound::WavReader::open(&path).expect("open");
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 100);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 140);
        assert_eq!(samples[0], 0.5);
        assert_eq!(samples[139], -0.25);
    }

    #[test]
    fn dropped_sink_still_produces_readable_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("partial.wav");
        {
            let mut sink = WavSink::create(&path, 100, SampleEncoding::Pcm16).expect("create");
            sink.write_frame(&[1.0, -1.0, 2.0]).expect("frame");
        }
        let mut reader = hound::WavReader::open(&path).expect("open");
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX, i16::MAX]);
    }

    #[test]
    fn memory_sink_keeps_frame_boundaries() {
        let mut frames: Vec<Vec<f32>> = Vec::new();
        frames.write_frame(&[1.0, 2.0]).unwrap();
        frames.write_frame(&[3.0]).unwrap();
        assert_eq!(frames, vec![vec![1.0, 2.0], vec![3.0]]);
    }
}
