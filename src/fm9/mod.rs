//! FM9 container format
//!
//! An FM9 file is a gzip member holding [VGM | 24-byte header | FX JSON],
//! followed by raw, uncompressed tails: the audio payload and a fixed-size
//! cover image. A constrained player inflates only the prefix, reads the
//! header it finds after the VGM data, and then seeks to the tails by byte
//! offset from the end of the gzip member.

pub mod image;
pub mod source_format;

pub use source_format::SourceFormat;

use crate::audio::AudioFormat;
use crate::error::{Error, Result};
use crate::gzip;
use crate::vgm::VgmReader;
use std::fs;
use std::path::Path;

/// FM9 header magic
pub const FM9_MAGIC: &[u8; 4] = b"FM90";

/// Current format version
pub const FM9_VERSION: u8 = 1;

/// Header size in bytes
pub const FM9_HEADER_SIZE: usize = 24;

/// Flag bits
pub const FLAG_HAS_AUDIO: u8 = 0x01;
pub const FLAG_HAS_FX: u8 = 0x02;
pub const FLAG_HAS_IMAGE: u8 = 0x04;

/// Fixed 24-byte FM9 extension header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fm9Header {
    pub version: u8,
    pub flags: u8,
    pub audio_format: u8,
    pub source_format: u8,
    /// Reserved; the audio payload sits after the gzip member, not at a
    /// header-relative offset
    pub audio_offset: u32,
    pub audio_size: u32,
    /// Offset of the FX JSON from the start of this header
    pub fx_offset: u32,
    pub fx_size: u32,
}

impl Fm9Header {
    pub fn to_bytes(&self) -> [u8; FM9_HEADER_SIZE] {
        let mut out = [0u8; FM9_HEADER_SIZE];
        out[0..4].copy_from_slice(FM9_MAGIC);
        out[4] = self.version;
        out[5] = self.flags;
        out[6] = self.audio_format;
        out[7] = self.source_format;
        out[8..12].copy_from_slice(&self.audio_offset.to_le_bytes());
        out[12..16].copy_from_slice(&self.audio_size.to_le_bytes());
        out[16..20].copy_from_slice(&self.fx_offset.to_le_bytes());
        out[20..24].copy_from_slice(&self.fx_size.to_le_bytes());
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FM9_HEADER_SIZE {
            return Err(Error::InputTruncated {
                offset: data.len(),
                what: "FM9 header",
            });
        }
        if &data[0..4] != FM9_MAGIC {
            return Err(Error::BadMagic { expected: "FM90" });
        }
        Ok(Self {
            version: data[4],
            flags: data[5],
            audio_format: data[6],
            source_format: data[7],
            audio_offset: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            audio_size: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            fx_offset: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            fx_size: u32::from_le_bytes([data[20], data[21], data[22], data[23]]),
        })
    }

    pub fn has_audio(&self) -> bool {
        self.flags & FLAG_HAS_AUDIO != 0
    }

    pub fn has_fx(&self) -> bool {
        self.flags & FLAG_HAS_FX != 0
    }

    pub fn has_image(&self) -> bool {
        self.flags & FLAG_HAS_IMAGE != 0
    }
}

/// FM9 file builder
pub struct Fm9Writer {
    vgm_data: Vec<u8>,
    audio_data: Vec<u8>,
    audio_format: AudioFormat,
    fx_data: Vec<u8>,
    cover_data: Option<Vec<u8>>,
    source_format: SourceFormat,
}

impl Fm9Writer {
    pub fn new(vgm_data: Vec<u8>, source_format: SourceFormat) -> Self {
        Self {
            vgm_data,
            audio_data: Vec::new(),
            audio_format: AudioFormat::None,
            fx_data: Vec::new(),
            cover_data: None,
            source_format,
        }
    }

    /// Attach a WAV or MP3 audio payload
    pub fn set_audio(&mut self, data: Vec<u8>, format: AudioFormat) {
        self.audio_format = format;
        self.audio_data = data;
    }

    /// Attach effect-automation JSON. The content is opaque to this tool
    /// apart from a sanity check that it starts with an object.
    pub fn set_fx(&mut self, data: Vec<u8>) -> Result<()> {
        let first = data.iter().copied().find(|b| !b" \t\r\n".contains(b));
        if first != Some(b'{') {
            return Err(Error::UnsupportedFormat(
                "FX payload does not look like JSON".into(),
            ));
        }
        self.fx_data = data;
        Ok(())
    }

    /// Attach a prepared RGB565 cover image (exactly 20,000 bytes)
    pub fn set_cover(&mut self, data: Vec<u8>) -> Result<()> {
        if data.len() != image::COVER_BYTES {
            return Err(Error::ImageDecode(format!(
                "cover must be {} bytes of RGB565, got {}",
                image::COVER_BYTES,
                data.len()
            )));
        }
        self.cover_data = Some(data);
        Ok(())
    }

    fn build_header(&self) -> Fm9Header {
        let mut flags = 0u8;
        if !self.audio_data.is_empty() {
            flags |= FLAG_HAS_AUDIO;
        }
        if !self.fx_data.is_empty() {
            flags |= FLAG_HAS_FX;
        }
        if self.cover_data.is_some() {
            flags |= FLAG_HAS_IMAGE;
        }

        Fm9Header {
            version: FM9_VERSION,
            flags,
            audio_format: self.audio_format as u8,
            source_format: self.source_format.code(),
            audio_offset: 0,
            audio_size: self.audio_data.len() as u32,
            fx_offset: if self.fx_data.is_empty() {
                0
            } else {
                FM9_HEADER_SIZE as u32
            },
            fx_size: self.fx_data.len() as u32,
        }
    }

    /// Compose the complete FM9 file image
    pub fn build(&self) -> Result<Vec<u8>> {
        if self.vgm_data.is_empty() {
            return Err(Error::UnsupportedFormat("no VGM data to wrap".into()));
        }

        // Compressed region: VGM, then the header, then the FX JSON
        let mut prefix = Vec::with_capacity(
            self.vgm_data.len() + FM9_HEADER_SIZE + self.fx_data.len(),
        );
        prefix.extend_from_slice(&self.vgm_data);
        prefix.extend_from_slice(&self.build_header().to_bytes());
        prefix.extend_from_slice(&self.fx_data);

        let mut out = gzip::wrap(&prefix)?;

        // Uncompressed tails: audio first, then the cover image
        out.extend_from_slice(&self.audio_data);
        if let Some(cover) = &self.cover_data {
            out.extend_from_slice(cover);
        }
        Ok(out)
    }

    /// Build and write the FM9 file, returning the byte count written
    pub fn write(&self, path: &Path) -> Result<usize> {
        let data = self.build()?;
        fs::write(path, &data).map_err(|source| Error::OutputWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(data.len())
    }
}

/// A parsed FM9 file
#[derive(Debug)]
pub struct Fm9File {
    pub header: Fm9Header,
    pub vgm_data: Vec<u8>,
    pub fx_data: Vec<u8>,
    pub audio_data: Vec<u8>,
    pub cover_data: Option<Vec<u8>>,
}

impl Fm9File {
    /// Parse an FM9 file image: inflate the prefix, locate the header
    /// after the VGM data, then slice the raw tails.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let unwrapped = gzip::unwrap(data)?;
        let prefix = &unwrapped.data;

        // The VGM's EOF header field tells us where the container header starts
        let mut reader = VgmReader::new(prefix);
        let vgm_header = reader.parse_header()?;
        let vgm_end = vgm_header.end_offset().min(prefix.len());

        let header = Fm9Header::parse(&prefix[vgm_end..])?;

        let fx_data = if header.has_fx() {
            let fx_start = vgm_end + header.fx_offset as usize;
            let fx_end = fx_start + header.fx_size as usize;
            if fx_end > prefix.len() {
                return Err(Error::InputTruncated {
                    offset: fx_start,
                    what: "FM9 FX payload",
                });
            }
            prefix[fx_start..fx_end].to_vec()
        } else {
            Vec::new()
        };

        // Tails sit after the gzip member
        let mut tail = unwrapped.consumed;
        let audio_data = if header.has_audio() {
            let end = tail + header.audio_size as usize;
            if end > data.len() {
                return Err(Error::InputTruncated {
                    offset: tail,
                    what: "FM9 audio payload",
                });
            }
            let audio = data[tail..end].to_vec();
            tail = end;
            audio
        } else {
            Vec::new()
        };

        let cover_data = if header.has_image() {
            let end = tail + image::COVER_BYTES;
            if end > data.len() {
                return Err(Error::InputTruncated {
                    offset: tail,
                    what: "FM9 cover image",
                });
            }
            Some(data[tail..end].to_vec())
        } else {
            None
        };

        Ok(Self {
            header,
            vgm_data: prefix[..vgm_end].to_vec(),
            fx_data,
            audio_data,
            cover_data,
        })
    }
}
