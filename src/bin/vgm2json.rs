//! VGM/VGZ/FM9 to JSON converter

use clap::Parser;
use fmconv::fm9::Fm9File;
use fmconv::gzip;
use fmconv::vgm::{VgmJson, VgmReader};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vgm2json")]
#[command(version = "0.1.0")]
#[command(about = "Convert VGM/VGZ/FM9 files to JSON", long_about = None)]
struct Args {
    /// Input VGM, VGZ or FM9 file
    input: PathBuf,

    /// Output JSON file (writes to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output compact JSON (default is pretty-printed)
    #[arg(short, long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let data = read_vgm_file(&args.input)?;

    let mut reader = VgmReader::new(&data);
    let header = reader.parse_header()?;
    let gd3 = reader.parse_gd3(&header);
    let commands = reader.parse_commands(&header)?;

    let vgm_json = VgmJson::new(&header, gd3.as_ref(), commands);

    let json_string = if args.compact {
        serde_json::to_string(&vgm_json)?
    } else {
        serde_json::to_string_pretty(&vgm_json)?
    };

    match args.output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(json_string.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => {
            println!("{}", json_string);
        }
    }

    Ok(())
}

/// Read a VGM, VGZ or FM9 file, reducing it to raw VGM bytes
fn read_vgm_file(path: &PathBuf) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = std::fs::read(path)?;

    let is_fm9 = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("fm9"))
        .unwrap_or(false);

    if is_fm9 {
        // Strip the container; only the inner VGM is dumped
        let file = Fm9File::parse(&data)?;
        eprintln!(
            "FM9 container: fx {} bytes, audio {} bytes, cover {}",
            file.fx_data.len(),
            file.audio_data.len(),
            if file.cover_data.is_some() { "yes" } else { "no" },
        );
        return Ok(file.vgm_data);
    }

    if gzip::is_gzip(&data) {
        return Ok(gzip::unwrap(&data)?.data);
    }

    Ok(data)
}
