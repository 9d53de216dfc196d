//! VGM stream writer
//!
//! Assembles a VGM byte stream in memory: a fixed-layout header followed by
//! the command body, the end marker and an optional GD3 tag. Offsets stored
//! in the header are relative to their own field position.

use super::delay;
use super::gd3::Gd3Tag;
use super::header::{offset, VgmHeader, VGM_HEADER_SIZE};

/// VGM stream writer
pub struct VgmWriter {
    header: VgmHeader,
    /// Command body (everything after the header, before the end marker)
    body: Vec<u8>,
    /// Absolute byte offset of the loop start, if marked
    loop_offset: Option<usize>,
    /// Loop length in samples, if known
    loop_samples: Option<u32>,
}

impl VgmWriter {
    pub fn new() -> Self {
        Self {
            header: VgmHeader::new(),
            body: Vec::new(),
            loop_offset: None,
            loop_samples: None,
        }
    }

    /// Absolute byte position the next command will land at
    pub fn position(&self) -> usize {
        VGM_HEADER_SIZE + self.body.len()
    }

    /// Set a chip clock in the header
    pub fn set_chip_clock(&mut self, offset: usize, clock: u32) {
        self.header.write_u32(offset, clock);
    }

    /// Set total samples
    pub fn set_total_samples(&mut self, samples: u32) {
        self.header.write_u32(offset::TOTAL_SAMPLES, samples);
    }

    /// Mark current position as loop start
    pub fn mark_loop_start(&mut self) {
        self.loop_offset = Some(self.position());
    }

    /// Set the loop start at an absolute byte position
    pub fn set_loop_start(&mut self, position: usize) {
        self.loop_offset = Some(position);
    }

    /// Set loop length in samples
    pub fn set_loop_samples(&mut self, samples: u32) {
        self.loop_samples = Some(samples);
    }

    /// Append raw bytes to the command body
    pub fn write_data(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    /// Append a register-write command
    pub fn write_command(&mut self, op: u8, reg: u8, data: u8) {
        self.body.extend_from_slice(&[op, reg, data]);
    }

    /// Append delay commands for the given sample count
    pub fn write_delay(&mut self, samples: u32) {
        if samples > 0 {
            let commands = delay::generate_delay(samples);
            self.body.extend_from_slice(&commands);
        }
    }

    /// Get mutable reference to header
    pub fn header_mut(&mut self) -> &mut VgmHeader {
        &mut self.header
    }

    /// Emit the end marker, append the GD3 tag and back-patch the header,
    /// consuming the writer and returning the finished byte stream.
    pub fn finalize(mut self, gd3: Option<&Gd3Tag>) -> Vec<u8> {
        self.body.push(delay::cmd::END);

        // Loop fields are patched before the GD3 tag is appended, so the
        // byte positions recorded during capture remain valid. A zero
        // byte-position means "no loop".
        if let Some(loop_pos) = self.loop_offset {
            if loop_pos > 0 {
                self.header
                    .write_u32(offset::LOOP_OFFSET, (loop_pos - offset::LOOP_OFFSET) as u32);
                if let Some(samples) = self.loop_samples {
                    self.header.write_u32(offset::LOOP_SAMPLES, samples);
                }
            }
        }

        // GD3 tag follows the end marker; its offset is relative to 0x14
        if let Some(tag) = gd3 {
            if !tag.is_empty() {
                let gd3_pos = VGM_HEADER_SIZE + self.body.len();
                self.header
                    .write_u32(offset::GD3_OFFSET, (gd3_pos - offset::GD3_OFFSET) as u32);
                self.body.extend_from_slice(&tag.serialize());
            }
        }

        // End of file offset (relative to 0x04)
        let file_size = VGM_HEADER_SIZE + self.body.len();
        self.header
            .write_u32(offset::EOF_OFFSET, (file_size - offset::EOF_OFFSET) as u32);

        let mut out = Vec::with_capacity(file_size);
        out.extend_from_slice(self.header.as_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

impl Default for VgmWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_stream() {
        let writer = VgmWriter::new();
        let data = writer.finalize(None);
        assert_eq!(data.len(), VGM_HEADER_SIZE + 1);
        assert_eq!(data[VGM_HEADER_SIZE], 0x66);
        // EOF offset is relative to 0x04
        let eof = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        assert_eq!(eof as usize, data.len() - 0x04);
    }

    #[test]
    fn test_loop_backpatch() {
        let mut writer = VgmWriter::new();
        writer.write_command(0x5A, 0x20, 0x01);
        writer.mark_loop_start();
        let loop_pos = writer.position();
        writer.write_delay(735);
        writer.write_command(0x5A, 0xB0, 0x20);
        writer.set_loop_samples(735);
        writer.set_total_samples(735);

        let data = writer.finalize(None);
        let loop_field = u32::from_le_bytes([data[0x1C], data[0x1D], data[0x1E], data[0x1F]]);
        assert_eq!(loop_field as usize, loop_pos - 0x1C);
        let loop_samples = u32::from_le_bytes([data[0x20], data[0x21], data[0x22], data[0x23]]);
        assert_eq!(loop_samples, 735);
    }

    #[test]
    fn test_gd3_offset() {
        let mut writer = VgmWriter::new();
        writer.write_command(0x5A, 0x20, 0x01);
        let tag = Gd3Tag {
            title_en: "x".into(),
            ..Default::default()
        };
        let data = writer.finalize(Some(&tag));
        let gd3_field = u32::from_le_bytes([data[0x14], data[0x15], data[0x16], data[0x17]]);
        let gd3_pos = gd3_field as usize + 0x14;
        assert_eq!(&data[gd3_pos..gd3_pos + 4], b"Gd3 ");
        // GD3 sits right after the end marker
        assert_eq!(data[gd3_pos - 1], 0x66);
    }

    #[test]
    fn test_empty_gd3_not_emitted() {
        let writer = VgmWriter::new();
        let data = writer.finalize(Some(&Gd3Tag::default()));
        let gd3_field = u32::from_le_bytes([data[0x14], data[0x15], data[0x16], data[0x17]]);
        assert_eq!(gd3_field, 0);
    }
}
