//! CLI argument definitions for `loopscape`.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("Loopscape")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Render long, seamlessly looping ambient soundscapes")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Only log errors")
                .conflicts_with("debug"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .short('d')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Show debug output"),
        )
        .subcommand(
            Command::new("generate")
                .about("Render a soundscape from a JSON config")
                .arg(
                    Arg::new("CONFIG")
                        .help("Path to the JSON render config")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_name("SEED")
                        .value_parser(value_parser!(u64))
                        .help("Seed for the noise re-sampling and length search"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("PATH")
                        .help("Override the config's output path"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Preprocess tracks and print the loop plan as JSON without rendering")
                .arg(
                    Arg::new("CONFIG")
                        .help("Path to the JSON render config")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_name("SEED")
                        .value_parser(value_parser!(u64))
                        .help("Seed for the length search"),
                ),
        )
        .subcommand(
            Command::new("pad")
                .about("Pad a single music clip so it loops on the beat")
                .arg(
                    Arg::new("INPUT")
                        .help("The music clip to pad")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("OUTPUT")
                        .help("Where to write the padded clip")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("bpm")
                        .long("bpm")
                        .value_name("BPM")
                        .value_parser(value_parser!(f64))
                        .requires("beats")
                        .help("Fixed tempo instead of beat tracking"),
                )
                .arg(
                    Arg::new("beats")
                        .long("beats")
                        .value_name("SECONDS")
                        .value_delimiter(',')
                        .value_parser(value_parser!(f64))
                        .requires("bpm")
                        .help("Comma separated beat times in seconds"),
                )
                .arg(
                    Arg::new("sample-rate")
                        .long("sample-rate")
                        .value_name("HZ")
                        .value_parser(value_parser!(u32))
                        .default_value("44100")
                        .help("Expected sample rate of the clip"),
                )
                .arg(
                    Arg::new("pcm16")
                        .long("pcm16")
                        .action(ArgAction::SetTrue)
                        .help("Write 16-bit PCM instead of 32-bit float"),
                ),
        )
        .subcommand(
            Command::new("downsample")
                .about("Re-encode a render with ffmpeg")
                .arg(
                    Arg::new("INPUT")
                        .help("The rendered file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("OUTPUT")
                        .help("The encoded output, format chosen by extension")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("bitrate")
                        .long("bitrate")
                        .short('b')
                        .value_name("KBPS")
                        .value_parser(value_parser!(u32))
                        .default_value("128")
                        .help("Audio bitrate in kbps"),
                )
                .arg(
                    Arg::new("keep-input")
                        .long("keep-input")
                        .action(ArgAction::SetTrue)
                        .help("Do not delete the input after encoding"),
                ),
        )
        .subcommand(
            Command::new("video")
                .about("Pair a still image with a render as a video")
                .arg(
                    Arg::new("IMAGE")
                        .help("The still image")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("AUDIO")
                        .help("The audio track")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("OUTPUT")
                        .help("The video file to write")
                        .required(true)
                        .index(3),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .subcommand_required(true)
                .subcommand(Command::new("config").about("Print a default render config")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn beats_are_comma_separated() {
        let matches = build_cli()
            .try_get_matches_from(["loopscape", "pad", "in.wav", "out.wav", "--bpm", "90", "--beats", "0.5,1.2,1.8"])
            .expect("parse");
        let (_, pad) = matches.subcommand().expect("subcommand");
        let beats: Vec<f64> = pad.get_many::<f64>("beats").unwrap().copied().collect();
        assert_eq!(beats, vec![0.5, 1.2, 1.8]);
    }

    #[test]
    fn bpm_requires_beats() {
        assert!(build_cli()
            .try_get_matches_from(["loopscape", "pad", "in.wav", "out.wav", "--bpm", "90"])
            .is_err());
    }
}
