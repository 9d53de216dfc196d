use clap::Parser;
use fmconv::audio::{self, AudioFormat};
use fmconv::error::{Error, Result};
use fmconv::fm9::{image, Fm9Writer, SourceFormat};
use fmconv::hmp;
use fmconv::router::{self, FormatClass, Metadata};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "fmconv")]
#[command(version = "0.1.0")]
#[command(about = "Convert retro PC music formats to VGM/FM9 for OPL2/OPL3 hardware", long_about = None)]
struct Args {
    /// Input music file
    input: PathBuf,

    /// Output file (derived from the input when omitted)
    output: Option<PathBuf>,

    /// Build an FM9 container instead of VGZ
    #[arg(long)]
    fm9: bool,

    /// Write uncompressed .vgm instead of .vgz
    #[arg(long)]
    no_compress: bool,

    /// Don't add a format suffix (_RAD, _HMP, ...) to derived filenames
    #[arg(long)]
    no_suffix: bool,

    /// Audio payload to embed in the FM9 container (WAV or MP3)
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Effect-automation JSON to embed in the FM9 container
    #[arg(long)]
    fx: Option<PathBuf>,

    /// Cover image to embed in the FM9 container
    #[arg(long)]
    cover: Option<PathBuf>,

    /// Skip palette quantisation and dithering of the cover image
    #[arg(long)]
    no_dither: bool,

    /// Track title
    #[arg(long)]
    title: Option<String>,

    /// Composer name
    #[arg(long)]
    author: Option<String>,

    /// Album/game name
    #[arg(long)]
    album: Option<String>,

    /// Original system
    #[arg(long)]
    system: Option<String>,

    /// Release date
    #[arg(long)]
    date: Option<String>,

    /// Additional notes
    #[arg(long)]
    notes: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Exit codes: 1 bad usage, 2 load/parse error, 3 write error
fn exit_code_for(error: &Error) -> u8 {
    match error {
        Error::OutputWrite { .. } | Error::Compress(_) => 3,
        Error::UnsupportedFormat(_) => 1,
        _ => 2,
    }
}

fn metadata_from(args: &Args) -> Metadata {
    Metadata {
        title: args.title.clone().unwrap_or_default(),
        author: args.author.clone().unwrap_or_default(),
        album: args.album.clone().unwrap_or_default(),
        system: args.system.clone().unwrap_or_default(),
        date: args.date.clone().unwrap_or_default(),
        notes: args.notes.clone().unwrap_or_default(),
    }
}

fn run(args: &Args) -> Result<()> {
    match router::classify(&args.input) {
        FormatClass::VgmPass => convert_passthrough(args),
        FormatClass::MidiStyle => {
            let ext = router::extension_lower(&args.input);
            if ext == "hmp" || ext == "hmi" {
                transcode_hmp(args)
            } else {
                Err(Error::UnsupportedFormat(format!(
                    ".{} input needs the MIDI synthesizer backend; this build only \
                     repackages VGM/VGZ/FM9 and transcodes HMP",
                    ext
                )))
            }
        }
        FormatClass::NativeOpl | FormatClass::Tracker | FormatClass::Unknown => {
            Err(Error::UnsupportedFormat(format!(
                "{} needs an upstream OPL or tracker player; this build only \
                 repackages VGM/VGZ/FM9 and transcodes HMP",
                args.input.display()
            )))
        }
    }
}

/// Re-wrap a VGM/VGZ/FM9 input, merging metadata and optional payloads
fn convert_passthrough(args: &Args) -> Result<()> {
    let data = router::read_input(&args.input)?;
    let vgm = router::load_vgm_input(&data)?;
    let vgm = router::apply_metadata(vgm, &metadata_from(args))?;

    if args.fm9 || args.audio.is_some() || args.fx.is_some() || args.cover.is_some() {
        let source = SourceFormat::from_extension(&router::extension_lower(&args.input));
        let mut writer = Fm9Writer::new(vgm, source);

        if let Some(path) = &args.audio {
            let audio_data = router::read_input(path)?;
            match audio::detect_audio_format(&audio_data) {
                AudioFormat::Wav => {
                    // No MP3 encoder is linked into this build; the
                    // payload helper embeds normalised WAV instead
                    let (payload, format) = audio::prepare_payload(&audio_data, None)?;
                    writer.set_audio(payload, format);
                }
                AudioFormat::Mp3 => writer.set_audio(audio_data, AudioFormat::Mp3),
                AudioFormat::None => {
                    return Err(Error::UnsupportedFormat(format!(
                        "{} is neither WAV nor MP3",
                        path.display()
                    )))
                }
            }
        }

        if let Some(path) = &args.fx {
            writer.set_fx(router::read_input(path)?)?;
        }

        if let Some(path) = &args.cover {
            writer.set_cover(image::load_cover(path, !args.no_dither)?)?;
        }

        let output = router::derive_output_path(
            &args.input,
            args.output.as_deref(),
            !args.no_suffix,
            "fm9",
        );
        let written = writer.write(&output)?;
        println!("Wrote {} ({} bytes)", output.display(), written);
    } else {
        let ext = if args.no_compress { "vgm" } else { "vgz" };
        let output = router::derive_output_path(
            &args.input,
            args.output.as_deref(),
            !args.no_suffix,
            ext,
        );
        let written = router::write_vgm_output(&output, &vgm, !args.no_compress)?;
        println!("Wrote {} ({} bytes)", output.display(), written);
    }

    Ok(())
}

/// Transcode an HMP/HMI file to a Standard MIDI File
fn transcode_hmp(args: &Args) -> Result<()> {
    if args.fm9 {
        return Err(Error::UnsupportedFormat(
            "FM9 output from HMP needs the MIDI synthesizer backend".into(),
        ));
    }

    let data = router::read_input(&args.input)?;
    let midi = hmp::to_midi(&data)?;

    let output = router::derive_output_path(
        &args.input,
        args.output.as_deref(),
        !args.no_suffix,
        "mid",
    );
    let written = router::write_output(&output, &midi)?;
    println!("Wrote {} ({} bytes)", output.display(), written);
    Ok(())
}
