//! Post-processing through an external `ffmpeg` binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::error::MixError;

/// Default bitrate for compressed exports (kbps).
pub const DEFAULT_BITRATE_KBPS: u32 = 128;

/// Handle on the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: OsString,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Ffmpeg {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[OsString]) -> Result<(), MixError> {
        debug!("running {:?} {:?}", self.program, args);
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| {
                MixError::ExternalTool(format!("failed to start {:?}: {}", self.program, err))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(MixError::ExternalTool(format!(
                "{:?} exited with {}: {}",
                self.program, output.status, tail
            )));
        }
        Ok(())
    }

    /// Re-encode `input` at `bitrate_kbps`, format chosen by the output
    /// extension.
    ///
    /// When `input` and `output` are the same path the encode goes through a
    /// `.tmp` sibling that is renamed into place. Otherwise the input is
    /// removed afterwards unless `keep_input` is set.
    pub fn downsample(
        &self,
        input: &Path,
        output: &Path,
        bitrate_kbps: u32,
        keep_input: bool,
    ) -> Result<(), MixError> {
        let in_place = input == output;
        let target = if in_place {
            temp_path(output)
        } else {
            output.to_path_buf()
        };

        self.run(&downsample_args(input, &target, bitrate_kbps))?;

        if in_place {
            std::fs::rename(&target, output)?;
        } else if !keep_input {
            std::fs::remove_file(input)?;
        }
        info!(
            "Downsampled {} to {} at {} kbps",
            input.display(),
            output.display(),
            bitrate_kbps
        );
        Ok(())
    }

    /// Pair a still image with an audio track as a 1 fps H.264/AAC video.
    pub fn render_video(&self, image: &Path, audio: &Path, output: &Path) -> Result<(), MixError> {
        self.run(&video_args(image, audio, output))?;
        info!("Video saved to {}", output.display());
        Ok(())
    }
}

/// `downsample` with the default `ffmpeg` on `PATH`.
pub fn downsample(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    bitrate_kbps: u32,
    keep_input: bool,
) -> Result<(), MixError> {
    Ffmpeg::default().downsample(input.as_ref(), output.as_ref(), bitrate_kbps, keep_input)
}

/// `render_video` with the default `ffmpeg` on `PATH`.
pub fn render_video(
    image: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<(), MixError> {
    Ffmpeg::default().render_video(image.as_ref(), audio.as_ref(), output.as_ref())
}

fn temp_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn downsample_args(input: &Path, output: &Path, bitrate_kbps: u32) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        input.into(),
        "-b:a".into(),
        format!("{}k", bitrate_kbps).into(),
        output.into(),
    ]
}

fn video_args(image: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-loop".into(),
        "1".into(),
        "-framerate".into(),
        "1".into(),
        "-i".into(),
        image.into(),
        "-i".into(),
        audio.into(),
    ];
    for flag in [
        "-c:v", "libx264", "-tune", "stillimage", "-pix_fmt", "yuv420p", "-r", "1", "-c:a", "aac",
        "-shortest",
    ] {
        args.push(flag.into());
    }
    args.push(output.into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_arguments() {
        let args = downsample_args(Path::new("in.wav"), Path::new("out.mp3"), 128);
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(args, vec!["-y", "-i", "in.wav", "-b:a", "128k", "out.mp3"]);
    }

    #[test]
    fn in_place_encode_uses_temp_sibling() {
        assert_eq!(
            temp_path(Path::new("output/mix.mp3")),
            PathBuf::from("output/mix.mp3.tmp")
        );
    }

    #[test]
    fn video_arguments_loop_the_image_at_one_fps() {
        let args = video_args(Path::new("cover.png"), Path::new("mix.mp3"), Path::new("out.mp4"));
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(&args[..7], &["-y", "-loop", "1", "-framerate", "1", "-i", "cover.png"]);
        assert!(args.contains(&"libx264"));
        assert!(args.contains(&"aac"));
        assert!(args.contains(&"-shortest"));
        assert_eq!(args.last(), Some(&"out.mp4"));
    }

    #[test]
    fn missing_binary_is_an_external_tool_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.wav");
        std::fs::write(&input, b"not audio").expect("write");
        let ffmpeg = Ffmpeg::new("loopscape-test-missing-ffmpeg");

        let result = ffmpeg.downsample(&input, &dir.path().join("out.mp3"), 128, false);
        assert!(matches!(result, Err(MixError::ExternalTool(_))));
        // Nothing is deleted when the encode fails.
        assert!(input.exists());
    }
}
