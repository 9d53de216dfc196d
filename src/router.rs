//! Format routing and VGM pass-through
//!
//! Input files are classified by extension through the source-format
//! registry. VGM/VGZ/FM9 inputs are re-wrapped without re-capture; the
//! other classes are driven through an upstream player into a capture
//! chip by the embedding application.

use crate::error::{Error, Result};
use crate::fm9::SourceFormat;
use crate::gzip;
use crate::vgm::header::offset;
use crate::vgm::{Gd3Tag, VgmReader};
use std::fs;
use std::path::{Path, PathBuf};

/// Which pipeline an input belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatClass {
    /// Already VGM-shaped; re-wrap without playing
    VgmPass,
    /// MIDI-style, needs an FM bank and the MIDI synthesizer
    MidiStyle,
    /// Native OPL format with embedded instruments
    NativeOpl,
    /// Sample tracker format
    Tracker,
    Unknown,
}

/// Lowercased extension of a path, or empty string
pub fn extension_lower(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Classify an input file by its extension
pub fn classify(path: &Path) -> FormatClass {
    let format = SourceFormat::from_extension(&extension_lower(path));
    if format.is_pass_through() {
        FormatClass::VgmPass
    } else if format.is_midi_style() {
        FormatClass::MidiStyle
    } else if format.is_native_opl() {
        FormatClass::NativeOpl
    } else if format.is_tracker() {
        FormatClass::Tracker
    } else {
        FormatClass::Unknown
    }
}

/// CLI-supplied GD3 metadata
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub album: String,
    pub system: String,
    pub date: String,
    pub notes: String,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.author.is_empty()
            && self.album.is_empty()
            && self.system.is_empty()
            && self.date.is_empty()
            && self.notes.is_empty()
    }

    /// Merge over an existing tag: supplied fields win, the rest survive
    pub fn merge_into(&self, existing: Option<Gd3Tag>) -> Gd3Tag {
        let mut tag = existing.unwrap_or_default();
        if !self.title.is_empty() {
            tag.title_en = self.title.clone();
        }
        if !self.author.is_empty() {
            tag.composer_en = self.author.clone();
        }
        if !self.album.is_empty() {
            tag.game_en = self.album.clone();
        }
        if !self.system.is_empty() {
            tag.system_en = self.system.clone();
        }
        if !self.date.is_empty() {
            tag.date = self.date.clone();
        }
        if !self.notes.is_empty() {
            tag.notes = self.notes.clone();
        }
        tag.converter = "fmconv".into();
        tag
    }
}

/// Read a whole input file
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| Error::InputOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Load VGM bytes from a pass-through input: decompress when gzipped,
/// verify the magic, and truncate anything past the end-of-file offset
/// (an FM9 header left inside would otherwise be wrapped twice).
pub fn load_vgm_input(data: &[u8]) -> Result<Vec<u8>> {
    let raw = if gzip::is_gzip(data) {
        gzip::unwrap(data)?.data
    } else {
        data.to_vec()
    };

    let mut reader = VgmReader::new(&raw);
    let header = reader.parse_header()?;

    let end = header.end_offset().min(raw.len());
    if end < raw.len() {
        tracing::debug!(
            trailing = raw.len() - end,
            "dropping bytes past end-of-VGM"
        );
    }
    Ok(raw[..end].to_vec())
}

/// Replace or attach the GD3 tag of a finished VGM stream, patching the
/// GD3 and EOF offsets.
pub fn apply_metadata(data: Vec<u8>, meta: &Metadata) -> Result<Vec<u8>> {
    if meta.is_empty() {
        return Ok(data);
    }

    let mut reader = VgmReader::new(&data);
    let header = reader.parse_header()?;
    let existing = reader.parse_gd3(&header);

    // The tag occupies the file tail; everything before it is kept
    let gd3_start = if header.gd3_offset != 0 {
        (header.gd3_offset as usize + offset::GD3_OFFSET).min(data.len())
    } else {
        header.end_offset().min(data.len())
    };

    let merged = meta.merge_into(existing);
    let mut out = data[..gd3_start].to_vec();
    let gd3_pos = out.len();
    out.extend_from_slice(&merged.serialize());

    let write_u32 = |buf: &mut [u8], at: usize, v: u32| {
        buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    };
    write_u32(&mut out, offset::GD3_OFFSET, (gd3_pos - offset::GD3_OFFSET) as u32);
    let len = out.len();
    write_u32(&mut out, offset::EOF_OFFSET, (len - offset::EOF_OFFSET) as u32);

    Ok(out)
}

/// Derive the default output path: input basename, an upper-cased format
/// suffix, and the target extension. An explicit output path wins as-is.
pub fn derive_output_path(
    input: &Path,
    explicit: Option<&Path>,
    add_suffix: bool,
    target_ext: &str,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".into());
    let mut name = stem;
    if add_suffix {
        let ext = extension_lower(input);
        if !ext.is_empty() {
            name.push('_');
            name.push_str(&ext.to_uppercase());
        }
    }
    name.push('.');
    name.push_str(target_ext);

    input.with_file_name(name)
}

/// Write the finished output file
pub fn write_output(path: &Path, data: &[u8]) -> Result<usize> {
    fs::write(path, data).map_err(|source| Error::OutputWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(data.len())
}

/// Write a VGM stream, gzip-wrapped into a VGZ unless disabled
pub fn write_vgm_output(path: &Path, vgm: &[u8], compress: bool) -> Result<usize> {
    if compress {
        let wrapped = gzip::wrap(vgm)?;
        write_output(path, &wrapped)
    } else {
        write_output(path, vgm)
    }
}
