use std::path::Path;

use clap::ArgMatches;
use log::info;
use loopscape_lib::beats::{BeatEstimator, BeatGrid, FixedBeats, OnsetBeatTracker};
use loopscape_lib::config::{MixConfig, SampleEncoding};
use loopscape_lib::export;
use loopscape_lib::generate::{generate, pad_file, plan_mix};
use loopscape_lib::MixError;

pub fn run(args: &ArgMatches) -> Result<i32, MixError> {
    info!("Starting Loopscape CLI");
    match args.subcommand() {
        Some(("generate", sub)) => run_generate(sub),
        Some(("plan", sub)) => run_plan(sub),
        Some(("pad", sub)) => run_pad(sub),
        Some(("downsample", sub)) => run_downsample(sub),
        Some(("video", sub)) => run_video(sub),
        Some(("create", sub)) => run_create(sub),
        _ => Ok(-1),
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a String, MixError> {
    args.get_one::<String>(name)
        .ok_or_else(|| MixError::InvalidConfig(format!("missing argument {}", name)))
}

fn load_config(args: &ArgMatches) -> Result<MixConfig, MixError> {
    let mut config = MixConfig::from_file(required(args, "CONFIG")?)?;
    if let Some(seed) = args.get_one::<u64>("seed") {
        config.seed = Some(*seed);
    }
    Ok(config)
}

fn run_generate(args: &ArgMatches) -> Result<i32, MixError> {
    let mut config = load_config(args)?;
    if let Some(output) = args.get_one::<String>("output") {
        config.output_path = output.clone();
    }

    let summary = generate(&config, &OnsetBeatTracker::default())?;
    info!(
        "Rendered {} seconds ({} samples, {} noise refills) to {}",
        summary.frames_written, summary.samples_written, summary.noise_refills, config.output_path
    );
    Ok(0)
}

fn run_plan(args: &ArgMatches) -> Result<i32, MixError> {
    let config = load_config(args)?;
    let plan = plan_mix(&config, &OnsetBeatTracker::default())?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(0)
}

fn run_pad(args: &ArgMatches) -> Result<i32, MixError> {
    let input = required(args, "INPUT")?;
    let output = required(args, "OUTPUT")?;
    let sample_rate = args.get_one::<u32>("sample-rate").copied().unwrap_or(44100);
    let encoding = if args.get_flag("pcm16") {
        SampleEncoding::Pcm16
    } else {
        SampleEncoding::Float32
    };

    let estimator: Box<dyn BeatEstimator> = match (
        args.get_one::<f64>("bpm"),
        args.get_many::<f64>("beats"),
    ) {
        (Some(bpm), Some(beats)) => {
            Box::new(FixedBeats::new(BeatGrid::new(*bpm, beats.copied().collect())))
        }
        _ => Box::new(OnsetBeatTracker::default()),
    };

    let report = pad_file(input, output, sample_rate, estimator.as_ref(), encoding)?;
    info!(
        "Padded {} from {} to {} samples",
        input, report.source_samples, report.padded_samples
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

fn run_downsample(args: &ArgMatches) -> Result<i32, MixError> {
    let input = required(args, "INPUT")?;
    let output = required(args, "OUTPUT")?;
    let bitrate = args
        .get_one::<u32>("bitrate")
        .copied()
        .unwrap_or(export::DEFAULT_BITRATE_KBPS);
    export::downsample(
        Path::new(input),
        Path::new(output),
        bitrate,
        args.get_flag("keep-input"),
    )?;
    Ok(0)
}

fn run_video(args: &ArgMatches) -> Result<i32, MixError> {
    export::render_video(
        Path::new(required(args, "IMAGE")?),
        Path::new(required(args, "AUDIO")?),
        Path::new(required(args, "OUTPUT")?),
    )?;
    Ok(0)
}

fn run_create(args: &ArgMatches) -> Result<i32, MixError> {
    match args.subcommand() {
        Some(("config", _)) => {
            let json = serde_json::to_string_pretty(&MixConfig::default_template())?;
            println!("{}", json);
            Ok(0)
        }
        _ => Ok(-1),
    }
}
