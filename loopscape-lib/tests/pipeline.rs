use std::path::{Path, PathBuf};

use loopscape_lib::beats::{BeatGrid, FixedBeats, OnsetBeatTracker};
use loopscape_lib::config::{MixConfig, SampleEncoding};
use loopscape_lib::dsp::level::{db_to_linear, energy, rms};
use loopscape_lib::generate::{generate, pad_file, plan_mix, prepare_tracks, render};
use loopscape_lib::mix::{LoopPlan, PlanStrategy};
use loopscape_lib::MixError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SR: u32 = 8000;

fn write_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        writer.write_sample(sample).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

fn read_wav(path: &Path) -> Vec<f32> {
    let mut reader = hound::WavReader::open(path).expect("open wav");
    reader.samples::<f32>().map(|s| s.expect("sample")).collect()
}

fn tone(seconds: f64, freq: f64) -> Vec<f32> {
    (0..(seconds * SR as f64) as usize)
        .map(|i| (0.3 * (2.0 * std::f64::consts::PI * freq * i as f64 / SR as f64).sin()) as f32)
        .collect()
}

fn white_noise(seconds: f64, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..(seconds * SR as f64) as usize)
        .map(|_| rng.gen_range(-0.5_f32..0.5))
        .collect()
}

struct Fixture {
    _dir: tempfile::TempDir,
    music: PathBuf,
    noise: PathBuf,
    output: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let music = dir.path().join("loop.wav");
    let noise = dir.path().join("rain.wav");
    write_wav(&music, SR, &tone(3.0, 220.0));
    write_wav(&noise, SR, &white_noise(8.0, 3));
    let output = dir.path().join("out").join("mix.wav");
    Fixture {
        _dir: dir,
        music,
        noise,
        output,
    }
}

fn config(fixture: &Fixture, with_music: bool, with_noise: bool) -> MixConfig {
    let mut audio = Vec::new();
    if with_noise {
        audio.push(format!(
            r#"{{ "filename": {:?}, "type": "noise", "relative_loudness": 1.0 }}"#,
            fixture.noise.to_string_lossy()
        ));
    }
    if with_music {
        audio.push(format!(
            r#"{{ "filename": {:?}, "type": "music", "relative_loudness": 2.0,
                  "bpm": 60.0, "beats": [0.5, 1.5, 2.5] }}"#,
            fixture.music.to_string_lossy()
        ));
    }
    let raw = format!(
        r#"{{
            "decibels": -20.0,
            "target_length": 10.0,
            "output_path": {:?},
            "sample_rate": {},
            "seed": 17,
            "audio": [{}]
        }}"#,
        fixture.output.to_string_lossy(),
        SR,
        audio.join(",")
    );
    MixConfig::from_json(&raw).expect("config")
}

#[test]
fn generate_writes_the_planned_length() {
    let fixture = fixture();
    let config = config(&fixture, true, true);

    let plan = plan_mix(&config, &OnsetBeatTracker::default()).expect("plan");
    // 3 s clip + 1 s bridge, three loops overshoot 10 s by 20%.
    assert_eq!(plan.tracks[1].prepared_samples, 4 * SR as usize);
    assert!(matches!(plan.plan.strategy, PlanStrategy::Search { lcm: 32000, .. }));

    let summary = generate(&config, &OnsetBeatTracker::default()).expect("generate");
    assert_eq!(summary.samples_written, plan.plan.final_length_samples);
    assert_eq!(summary.frames_written, plan.plan.frame_count(SR));
    assert!((72_000..=88_000).contains(&summary.samples_written));

    let output = read_wav(&fixture.output);
    assert_eq!(output.len() as u64, summary.samples_written);
    assert!(output.last().unwrap().abs() < 1e-6);
}

#[test]
fn mix_is_the_sum_of_its_tracks() {
    let fixture = fixture();
    let config = config(&fixture, true, true);
    let prepared = prepare_tracks(&config, &OnsetBeatTracker::default()).expect("prepare");
    let plan = LoopPlan {
        final_length_samples: 12 * SR as u64 + 500,
        target_samples: 12 * SR as u64 + 500,
        strategy: PlanStrategy::Target,
    };

    // Noise is track 0 and music track 1. Only noise draws from the rng, so
    // each render sees the same noise stream.
    let mut rendered = Vec::new();
    for subset in [vec![1], vec![0], vec![0, 1]] {
        let tracks = subset.iter().map(|&i| prepared[i].clone()).collect();
        let mut frames: Vec<Vec<f32>> = Vec::new();
        render(&config, tracks, &plan, &mut frames, StdRng::seed_from_u64(5)).expect("render");
        rendered.push(frames.concat());
    }

    let (music, noise, mixed) = (&rendered[0], &rendered[1], &rendered[2]);
    assert_eq!(mixed.len() as u64, plan.final_length_samples);
    for i in 0..mixed.len() {
        assert!((mixed[i] - (music[i] + noise[i])).abs() < 1e-5, "sample {}", i);
    }
    let seconds = mixed
        .chunks(SR as usize)
        .zip(music.chunks(SR as usize))
        .zip(noise.chunks(SR as usize));
    for (second, ((mixed, music), noise)) in seconds.enumerate() {
        let bound = (energy(music).sqrt() + energy(noise).sqrt()).powi(2);
        assert!(energy(mixed) <= bound * (1.0 + 1e-6), "second {}", second);
    }
}

#[test]
fn single_noise_track_reaches_target_level() {
    let fixture = fixture();
    let config = config(&fixture, false, true);
    let summary = generate(&config, &OnsetBeatTracker::default()).expect("generate");
    assert_eq!(summary.samples_written, 10 * SR as u64);

    // The first seconds are the untouched normalized source.
    let output = read_wav(&fixture.output);
    let level = rms(&output[..3 * SR as usize]);
    let target = db_to_linear(-20.0);
    assert!((level - target).abs() < 0.1 * target, "{} vs {}", level, target);
}

#[test]
fn sample_rate_mismatch_is_rejected() {
    let fixture = fixture();
    write_wav(&fixture.music, 22050, &tone(1.0, 220.0));
    let config = config(&fixture, true, false);
    assert!(matches!(
        generate(&config, &OnsetBeatTracker::default()),
        Err(MixError::SampleRateMismatch {
            expected: 8000,
            found: 22050,
            ..
        })
    ));
    assert!(!fixture.output.exists());
}

#[test]
fn pad_file_appends_the_bridge() {
    let fixture = fixture();
    let padded = fixture.music.with_file_name("loop_padded.wav");
    let grid = BeatGrid::new(60.0, vec![0.5, 1.5, 2.5]);

    let report = pad_file(
        &fixture.music,
        &padded,
        SR,
        &FixedBeats::new(grid),
        SampleEncoding::Float32,
    )
    .expect("pad");
    assert_eq!(report.source_samples, 3 * SR as usize);
    assert_eq!(report.padded_samples, 4 * SR as usize);

    let samples = read_wav(&padded);
    assert_eq!(samples.len(), 4 * SR as usize);
    assert_eq!(&samples[..3 * SR as usize], &tone(3.0, 220.0)[..]);
}
