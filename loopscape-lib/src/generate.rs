//! End-to-end render pipeline: preprocess every track, reconcile the loop
//! length, then stream the mix to disk.

use std::path::Path;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::audio::decode::load_mono;
use crate::audio::encode::write_buffer;
use crate::audio::{AudioBuffer, FrameSink, WavSink};
use crate::beats::{BeatEstimator, BeatGrid, FixedBeats};
use crate::config::{MixConfig, SampleEncoding, TrackConfig, TrackKind};
use crate::dsp::loop_pad::pad_music;
use crate::dsp::normalize::normalize;
use crate::error::MixError;
use crate::mix::{reconcile, LoopPlan, MixSummary, StreamingMixer, TrackStream};

/// A track after normalization and, for music, loop padding.
#[derive(Debug, Clone)]
pub struct PreparedTrack {
    pub config: TrackConfig,
    pub buffer: AudioBuffer,
    pub source_samples: usize,
    pub gain: f64,
    pub grid: Option<BeatGrid>,
}

/// Per-track preprocessing outcome, as reported by `loopscape plan`.
#[derive(Debug, Clone, Serialize)]
pub struct TrackReport {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    pub source_samples: usize,
    pub prepared_samples: usize,
    pub gain: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
}

/// Everything decided before mixing starts.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPlan {
    pub sample_rate: u32,
    pub tracks: Vec<TrackReport>,
    pub plan: LoopPlan,
}

impl From<&PreparedTrack> for TrackReport {
    fn from(track: &PreparedTrack) -> Self {
        Self {
            filename: track.config.filename.clone(),
            kind: track.config.kind,
            source_samples: track.source_samples,
            prepared_samples: track.buffer.len(),
            gain: track.gain,
            bpm: track.grid.as_ref().map(|grid| grid.bpm),
        }
    }
}

/// Rng for a render: seeded when the config pins one, otherwise from entropy.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Load, normalize and (for music) loop-pad one track.
///
/// A beat grid given in the config takes precedence over `estimator`.
pub fn prepare_track(
    track: &TrackConfig,
    config: &MixConfig,
    estimator: &dyn BeatEstimator,
) -> Result<PreparedTrack, MixError> {
    let mut buffer = load_mono(&track.filename, config.sample_rate)?;
    let source_samples = buffer.len();
    let gain = normalize(
        &mut buffer,
        config.decibels,
        track.relative_loudness,
        config.total_loudness(),
    )?;
    debug!("{}: gain {:.4}", track.filename, gain);

    let (buffer, grid) = match track.kind {
        TrackKind::Noise => (buffer, None),
        TrackKind::Music => {
            let grid = match track.beat_grid() {
                Some(grid) => FixedBeats::new(grid).estimate(&buffer.samples, buffer.sample_rate)?,
                None => estimator.estimate(&buffer.samples, buffer.sample_rate)?,
            };
            let padded = pad_music(&buffer, &grid)?;
            (padded, Some(grid))
        }
    };

    Ok(PreparedTrack {
        config: track.clone(),
        buffer,
        source_samples,
        gain,
        grid,
    })
}

/// Preprocess every track in declaration order.
pub fn prepare_tracks(
    config: &MixConfig,
    estimator: &dyn BeatEstimator,
) -> Result<Vec<PreparedTrack>, MixError> {
    config
        .audio
        .iter()
        .map(|track| {
            info!("Preparing {} ({:?})", track.filename, track.kind);
            prepare_track(track, config, estimator)
        })
        .collect()
}

/// Reconcile the output length against the padded music lengths.
pub fn plan_length<R: Rng + ?Sized>(
    config: &MixConfig,
    prepared: &[PreparedTrack],
    rng: &mut R,
) -> LoopPlan {
    let music_lengths: Vec<u64> = prepared
        .iter()
        .filter(|track| track.config.kind == TrackKind::Music)
        .map(|track| track.buffer.len() as u64)
        .collect();
    reconcile(
        &music_lengths,
        config.target_samples(),
        &config.reconcile,
        rng,
    )
}

/// Run preprocessing and reconciliation without rendering anything.
pub fn plan_mix(config: &MixConfig, estimator: &dyn BeatEstimator) -> Result<RenderPlan, MixError> {
    let mut rng = seeded_rng(config.seed);
    let prepared = prepare_tracks(config, estimator)?;
    let plan = plan_length(config, &prepared, &mut rng);
    Ok(RenderPlan {
        sample_rate: config.sample_rate,
        tracks: prepared.iter().map(TrackReport::from).collect(),
        plan,
    })
}

/// Stream prepared tracks into `sink` following `plan`.
pub fn render<S: FrameSink + ?Sized, R: Rng>(
    config: &MixConfig,
    prepared: Vec<PreparedTrack>,
    plan: &LoopPlan,
    sink: &mut S,
    rng: R,
) -> Result<MixSummary, MixError> {
    let tracks = prepared
        .into_iter()
        .map(|track| TrackStream::new(track.config.filename, track.config.kind, track.buffer.samples))
        .collect::<Result<Vec<_>, _>>()?;
    let mixer = StreamingMixer::new(tracks, plan, config.sample_rate, &config.noise, rng)?;
    info!(
        "Rendering {} samples ({:.1} s)",
        plan.final_length_samples,
        plan.duration_seconds(config.sample_rate)
    );
    mixer.run(sink)
}

/// Render `config` to its output path.
///
/// The output file is finalized explicitly on success; on failure the
/// partially written file is flushed when the writer drops.
pub fn generate(config: &MixConfig, estimator: &dyn BeatEstimator) -> Result<MixSummary, MixError> {
    let mut rng = seeded_rng(config.seed);
    let prepared = prepare_tracks(config, estimator)?;
    let plan = plan_length(config, &prepared, &mut rng);

    let mut sink = WavSink::create(&config.output_path, config.sample_rate, config.encoding)?;
    let summary = render(config, prepared, &plan, &mut sink, rng)?;
    let written = sink.finalize()?;
    info!(
        "Wrote {} samples to {} (peak {:.3})",
        written, config.output_path, summary.peak
    );
    Ok(summary)
}

/// Outcome of padding a single file.
#[derive(Debug, Clone, Serialize)]
pub struct PadReport {
    pub grid: BeatGrid,
    pub source_samples: usize,
    pub padded_samples: usize,
}

/// Loop-pad one file and write it out without normalizing it.
pub fn pad_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    sample_rate: u32,
    estimator: &dyn BeatEstimator,
    encoding: SampleEncoding,
) -> Result<PadReport, MixError> {
    let input = input.as_ref();
    let buffer = load_mono(&input.to_string_lossy(), sample_rate)?;
    let grid = estimator.estimate(&buffer.samples, buffer.sample_rate)?;
    let padded = pad_music(&buffer, &grid)?;
    write_buffer(output, &padded, encoding)?;
    Ok(PadReport {
        grid,
        source_samples: buffer.len(),
        padded_samples: padded.len(),
    })
}
