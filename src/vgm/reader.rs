//! VGM file reader and parser

use super::commands::{command_size, opcode, VgmCommand};
use super::gd3::Gd3Tag;
use super::header::offset;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Parsed VGM header information
#[derive(Debug, Clone, Default)]
pub struct VgmHeader {
    pub version: u32,
    pub eof_offset: u32,
    pub total_samples: u32,
    pub loop_offset: u32,
    pub loop_samples: u32,
    pub rate: u32,
    pub data_offset: u32,
    pub gd3_offset: u32,
    pub chips: HashMap<String, ChipInfo>,
}

impl VgmHeader {
    /// Absolute byte offset one past the last byte the header accounts for
    pub fn end_offset(&self) -> usize {
        self.eof_offset as usize + offset::EOF_OFFSET
    }

    /// Absolute byte offset of the command data
    pub fn data_start(&self) -> usize {
        self.data_offset as usize + offset::DATA_OFFSET
    }
}

/// Information about a chip in the VGM
#[derive(Debug, Clone)]
pub struct ChipInfo {
    pub clock: u32,
    pub dual: bool,
}

/// VGM file reader
pub struct VgmReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> VgmReader<'a> {
    /// Create a new reader from raw VGM data
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Read a single byte
    fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::InputTruncated {
                offset: self.pos,
                what: "VGM command stream",
            });
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Read bytes into a buffer
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.pos + len > self.data.len() {
            return Err(Error::InputTruncated {
                offset: self.pos,
                what: "VGM command stream",
            });
        }
        let bytes = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(bytes)
    }

    /// Read a u32 at a specific offset without advancing position
    fn peek_u32_at(&self, offset: usize) -> Result<u32> {
        if offset + 4 > self.data.len() {
            return Err(Error::InputTruncated {
                offset,
                what: "VGM header",
            });
        }
        Ok(u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]))
    }

    /// Validate VGM magic and parse header
    pub fn parse_header(&mut self) -> Result<VgmHeader> {
        if self.data.len() < 0x40 {
            return Err(Error::InputTruncated {
                offset: self.data.len(),
                what: "VGM header",
            });
        }
        if &self.data[0..4] != b"Vgm " {
            return Err(Error::BadMagic { expected: "Vgm " });
        }

        let version = self.peek_u32_at(offset::VERSION)?;
        let eof_offset = self.peek_u32_at(offset::EOF_OFFSET)?;
        let total_samples = self.peek_u32_at(offset::TOTAL_SAMPLES)?;
        let loop_offset = self.peek_u32_at(offset::LOOP_OFFSET)?;
        let loop_samples = self.peek_u32_at(offset::LOOP_SAMPLES)?;
        let rate = self.peek_u32_at(offset::RATE)?;
        let gd3_offset = self.peek_u32_at(offset::GD3_OFFSET)?;

        // Data offset is relative to 0x34; zero means the pre-1.50 default
        let data_offset = if version >= 0x150 {
            let rel_offset = self.peek_u32_at(offset::DATA_OFFSET)?;
            if rel_offset == 0 {
                0x0C
            } else {
                rel_offset
            }
        } else {
            0x0C
        };

        // OPL-family chip clocks live in the 1.51 header region
        let mut chips = HashMap::new();
        if version >= 0x151 {
            self.parse_chip_clock(&mut chips, "ym3812", offset::YM3812_CLOCK);
            self.parse_chip_clock(&mut chips, "ym3526", offset::YM3526_CLOCK);
            self.parse_chip_clock(&mut chips, "y8950", offset::Y8950_CLOCK);
            self.parse_chip_clock(&mut chips, "ymf262", offset::YMF262_CLOCK);
        }

        Ok(VgmHeader {
            version,
            eof_offset,
            total_samples,
            loop_offset,
            loop_samples,
            rate,
            data_offset,
            gd3_offset,
            chips,
        })
    }

    /// Parse a chip clock from the header
    fn parse_chip_clock(
        &self,
        chips: &mut HashMap<String, ChipInfo>,
        name: &str,
        clock_offset: usize,
    ) {
        let clock = match self.peek_u32_at(clock_offset) {
            Ok(c) => c,
            Err(_) => return,
        };
        if clock != 0 {
            let dual = (clock & 0x4000_0000) != 0;
            chips.insert(
                name.to_string(),
                ChipInfo {
                    clock: clock & 0x3FFF_FFFF,
                    dual,
                },
            );
        }
    }

    /// Parse GD3 metadata
    pub fn parse_gd3(&mut self, header: &VgmHeader) -> Option<Gd3Tag> {
        if header.gd3_offset == 0 {
            return None;
        }

        // GD3 offset is relative to 0x14
        let gd3_pos = header.gd3_offset as usize + offset::GD3_OFFSET;
        if gd3_pos >= self.data.len() {
            return None;
        }

        Gd3Tag::parse(&self.data[gd3_pos..])
    }

    /// Parse the command stream up to the end marker
    pub fn parse_commands(&mut self, header: &VgmHeader) -> Result<Vec<VgmCommand>> {
        self.pos = header.data_start();
        let mut commands = Vec::new();

        loop {
            let op = self.read_u8()?;
            let command = match op {
                opcode::YM3812 => {
                    let args = self.read_bytes(2)?;
                    VgmCommand::Ym3812Write {
                        chip: 0,
                        reg: args[0],
                        data: args[1],
                    }
                }
                opcode::YM3812_2ND => {
                    let args = self.read_bytes(2)?;
                    VgmCommand::Ym3812Write {
                        chip: 1,
                        reg: args[0],
                        data: args[1],
                    }
                }
                opcode::YM3526 => {
                    let args = self.read_bytes(2)?;
                    VgmCommand::Ym3526Write {
                        reg: args[0],
                        data: args[1],
                    }
                }
                opcode::Y8950 => {
                    let args = self.read_bytes(2)?;
                    VgmCommand::Y8950Write {
                        reg: args[0],
                        data: args[1],
                    }
                }
                opcode::YMF262_PORT0 | opcode::YMF262_PORT1 => {
                    let args = self.read_bytes(2)?;
                    VgmCommand::Ymf262Write {
                        port: op - opcode::YMF262_PORT0,
                        reg: args[0],
                        data: args[1],
                    }
                }
                opcode::WAIT_NNNN => {
                    let args = self.read_bytes(2)?;
                    VgmCommand::Wait {
                        samples: u16::from_le_bytes([args[0], args[1]]) as u32,
                    }
                }
                opcode::WAIT_60TH => VgmCommand::Wait { samples: 735 },
                opcode::WAIT_50TH => VgmCommand::Wait { samples: 882 },
                0x70..=0x7F => VgmCommand::Wait {
                    samples: (op - 0x70) as u32 + 1,
                },
                opcode::END => {
                    commands.push(VgmCommand::End);
                    break;
                }
                opcode::DATA_BLOCK => {
                    // 0x67 0x66 tt ss ss ss ss, then ss bytes of data
                    let head = self.read_bytes(6)?;
                    let size =
                        u32::from_le_bytes([head[2], head[3], head[4], head[5]]) as usize;
                    let bytes = self.read_bytes(size)?;
                    VgmCommand::Unknown {
                        opcode: op,
                        bytes: [head, bytes].concat(),
                    }
                }
                other => {
                    let bytes = self.read_bytes(command_size(other))?;
                    VgmCommand::Unknown {
                        opcode: other,
                        bytes,
                    }
                }
            };
            commands.push(command);
        }

        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vgm::header::{CLOCK_YM3812, DUAL_CHIP_BIT};
    use crate::vgm::VgmWriter;

    #[test]
    fn test_round_trip_minimal() {
        let mut writer = VgmWriter::new();
        writer.set_chip_clock(offset::YM3812_CLOCK, CLOCK_YM3812);
        writer.write_command(opcode::YM3812, 0x20, 0x01);
        writer.write_delay(735);
        writer.set_total_samples(735);
        let data = writer.finalize(None);

        let mut reader = VgmReader::new(&data);
        let header = reader.parse_header().unwrap();
        assert_eq!(header.version, 0x151);
        assert_eq!(header.total_samples, 735);
        assert_eq!(header.end_offset(), data.len());
        assert_eq!(header.chips["ym3812"].clock, CLOCK_YM3812);
        assert!(!header.chips["ym3812"].dual);

        let commands = reader.parse_commands(&header).unwrap();
        assert_eq!(
            commands,
            vec![
                VgmCommand::Ym3812Write {
                    chip: 0,
                    reg: 0x20,
                    data: 0x01
                },
                VgmCommand::Wait { samples: 735 },
                VgmCommand::End,
            ]
        );
    }

    #[test]
    fn test_dual_chip_clock_flag() {
        let mut writer = VgmWriter::new();
        writer.set_chip_clock(offset::YM3812_CLOCK, CLOCK_YM3812 | DUAL_CHIP_BIT);
        let data = writer.finalize(None);

        let mut reader = VgmReader::new(&data);
        let header = reader.parse_header().unwrap();
        assert!(header.chips["ym3812"].dual);
        assert_eq!(header.chips["ym3812"].clock, CLOCK_YM3812);
    }

    #[test]
    fn test_bad_magic() {
        let data = vec![0u8; 0x100];
        let mut reader = VgmReader::new(&data);
        assert!(matches!(
            reader.parse_header(),
            Err(Error::BadMagic { expected: "Vgm " })
        ));
    }
}
