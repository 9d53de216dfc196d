//! Passive capture chip
//!
//! Buffers every register write an upstream player makes, with the elapsed
//! sample count since the previous write. Redundant writes are dropped
//! against a register-state matrix (except the key and volume bands).
//! The VGM byte stream is rendered once, after playback, for whichever
//! chip variant the write pattern revealed.

use super::{is_key_or_volume, ChipKind, OplSink, RegisterWrite};
use crate::vgm::commands::opcode;
use crate::vgm::gd3::Gd3Tag;
use crate::vgm::VgmWriter;

/// Loop point resolved by the driver, in capture coordinates
#[derive(Debug, Clone, Copy)]
struct LoopPoint {
    /// Index into the write buffer of the first looped write
    write_index: usize,
    /// Sample position at that write
    sample_pos: u32,
}

/// Passive OPL capture chip
pub struct CaptureChip {
    writes: Vec<RegisterWrite>,
    /// Last value written per (chip, low address)
    reg_state: [[u8; 256]; 2],
    /// Whether the register has been written at all
    reg_written: [[bool; 256]; 2],
    pending_samples: u32,
    total_samples: u32,
    curr_chip: u8,
    used_opl3_regs: bool,
    used_opl3_mode: bool,
    used_second_chip: bool,
    loop_point: Option<LoopPoint>,
}

impl CaptureChip {
    pub fn new() -> Self {
        Self {
            writes: Vec::with_capacity(100_000),
            reg_state: [[0; 256]; 2],
            reg_written: [[false; 256]; 2],
            pending_samples: 0,
            total_samples: 0,
            curr_chip: 0,
            used_opl3_regs: false,
            used_opl3_mode: false,
            used_second_chip: false,
            loop_point: None,
        }
    }

    /// Number of writes buffered so far
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Sample position of the capture, including time not yet attached
    /// to a write
    pub fn sample_position(&self) -> u32 {
        self.total_samples + self.pending_samples
    }

    pub fn has_loop_point(&self) -> bool {
        self.loop_point.is_some()
    }

    /// Record the loop target resolved by the driver. Only the first call
    /// takes effect.
    pub fn set_loop_point(&mut self, write_index: usize, sample_pos: u32) {
        if self.loop_point.is_none() {
            self.loop_point = Some(LoopPoint {
                write_index,
                sample_pos,
            });
        }
    }

    /// Chip variant implied by the writes seen so far
    pub fn detected_kind(&self) -> ChipKind {
        ChipKind::detect(
            self.used_opl3_regs,
            self.used_opl3_mode,
            self.used_second_chip,
        )
    }

    /// Render the buffered writes into a finished VGM byte stream.
    pub fn generate_vgm(&mut self, gd3: Option<&Gd3Tag>) -> Vec<u8> {
        // Trailing time not followed by a write still counts
        self.total_samples += self.pending_samples;
        self.pending_samples = 0;

        let kind = self.detected_kind();
        let mut writer = VgmWriter::new();
        writer.set_chip_clock(kind.clock_offset(), kind.clock_value());
        writer.set_total_samples(self.total_samples);

        let mut loop_byte_offset = 0usize;
        for (i, w) in self.writes.iter().enumerate() {
            if let Some(lp) = self.loop_point {
                if i == lp.write_index {
                    loop_byte_offset = writer.position();
                }
            }

            writer.write_delay(w.delay_samples);

            match kind {
                ChipKind::Opl2 => {
                    writer.write_command(opcode::YM3812, (w.reg & 0xFF) as u8, w.val);
                }
                ChipKind::DualOpl2 => {
                    let op = if w.chip == 0 {
                        opcode::YM3812
                    } else {
                        opcode::YM3812_2ND
                    };
                    writer.write_command(op, (w.reg & 0xFF) as u8, w.val);
                }
                ChipKind::Opl3 => {
                    let op = if w.reg >= 0x100 {
                        opcode::YMF262_PORT1
                    } else {
                        opcode::YMF262_PORT0
                    };
                    writer.write_command(op, (w.reg & 0xFF) as u8, w.val);
                }
            }
        }

        // A loop target that never produced a byte position (e.g. at the
        // very end of the capture) yields a file without loop fields.
        if let Some(lp) = self.loop_point {
            if loop_byte_offset > 0 {
                writer.set_loop_start(loop_byte_offset);
                writer.set_loop_samples(self.total_samples - lp.sample_pos);
            }
        }

        writer.finalize(gd3)
    }
}

impl OplSink for CaptureChip {
    fn write_register(&mut self, reg: u16, val: u8) {
        if reg >= 0x100 {
            self.used_opl3_regs = true;
            // OPL3 mode enable: register 0x105, bit 0 set
            if reg == 0x105 && (val & 0x01) != 0 {
                self.used_opl3_mode = true;
            }
        }

        // Registers 0x100+ track state in the second row; the high bank
        // and a physical second chip are never used in the same session.
        let row = if reg >= 0x100 { 1 } else { self.curr_chip as usize };
        let reg_low = (reg & 0xFF) as usize;

        if self.reg_written[row][reg_low]
            && self.reg_state[row][reg_low] == val
            && !is_key_or_volume(reg_low as u8)
        {
            // Dropped as redundant; pending samples stay accumulated
            return;
        }

        self.reg_state[row][reg_low] = val;
        self.reg_written[row][reg_low] = true;

        self.writes.push(RegisterWrite {
            delay_samples: self.pending_samples,
            reg,
            val,
            chip: self.curr_chip,
        });

        self.total_samples += self.pending_samples;
        self.pending_samples = 0;
    }

    fn select_chip(&mut self, chip: u8) {
        self.curr_chip = chip & 1;
        if self.curr_chip == 1 {
            self.used_second_chip = true;
        }
    }

    fn advance_samples(&mut self, samples: u32) {
        self.pending_samples += samples;
    }

    fn reset(&mut self) {
        // Players call this at song start; the write buffer is kept
        self.reg_state = [[0; 256]; 2];
        self.reg_written = [[false; 256]; 2];
    }
}

impl Default for CaptureChip {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vgm::header::VGM_HEADER_SIZE;

    #[test]
    fn test_redundant_write_dropped() {
        let mut chip = CaptureChip::new();
        chip.write_register(0x20, 0x01);
        chip.write_register(0x20, 0x01);
        assert_eq!(chip.write_count(), 1);
        chip.write_register(0x20, 0x02);
        assert_eq!(chip.write_count(), 2);
    }

    #[test]
    fn test_key_band_never_dropped() {
        let mut chip = CaptureChip::new();
        chip.write_register(0xB0, 0x20);
        chip.write_register(0xB0, 0x20);
        assert_eq!(chip.write_count(), 2);
    }

    #[test]
    fn test_volume_band_never_dropped() {
        let mut chip = CaptureChip::new();
        chip.write_register(0x43, 0x3F);
        chip.write_register(0x43, 0x3F);
        assert_eq!(chip.write_count(), 2);
    }

    #[test]
    fn test_first_write_of_zero_not_dropped() {
        // State starts zeroed but unwritten; a first write of zero must
        // still be captured.
        let mut chip = CaptureChip::new();
        chip.write_register(0x20, 0x00);
        assert_eq!(chip.write_count(), 1);
    }

    #[test]
    fn test_pending_kept_across_dropped_write() {
        let mut chip = CaptureChip::new();
        chip.write_register(0x20, 0x01);
        chip.advance_samples(100);
        chip.write_register(0x20, 0x01); // dropped
        chip.advance_samples(50);
        chip.write_register(0x20, 0x02);
        assert_eq!(chip.writes[1].delay_samples, 150);
    }

    #[test]
    fn test_detects_opl3_from_high_registers() {
        let mut chip = CaptureChip::new();
        chip.write_register(0x1A0, 0x40);
        assert_eq!(chip.detected_kind(), ChipKind::Opl3);
    }

    #[test]
    fn test_detects_dual_opl2() {
        let mut chip = CaptureChip::new();
        chip.select_chip(1);
        chip.write_register(0x20, 0x01);
        assert_eq!(chip.detected_kind(), ChipKind::DualOpl2);
    }

    #[test]
    fn test_second_chip_state_separate() {
        let mut chip = CaptureChip::new();
        chip.write_register(0x20, 0x01);
        chip.select_chip(1);
        // Same register and value on the other chip is not redundant
        chip.write_register(0x20, 0x01);
        assert_eq!(chip.write_count(), 2);
    }

    #[test]
    fn test_generated_body_bytes() {
        let mut chip = CaptureChip::new();
        chip.write_register(0x20, 0x01);
        chip.advance_samples(735);
        chip.write_register(0xB0, 0x2A);
        let vgm = chip.generate_vgm(None);

        let body = &vgm[VGM_HEADER_SIZE..];
        assert_eq!(
            body,
            &[0x5A, 0x20, 0x01, 0x62, 0x5A, 0xB0, 0x2A, 0x66]
        );
    }

    #[test]
    fn test_loop_at_end_emits_no_loop() {
        let mut chip = CaptureChip::new();
        chip.write_register(0x20, 0x01);
        chip.advance_samples(100);
        // Loop target past the last write never resolves to a byte offset
        chip.set_loop_point(1, 100);
        let vgm = chip.generate_vgm(None);
        let loop_field = u32::from_le_bytes([vgm[0x1C], vgm[0x1D], vgm[0x1E], vgm[0x1F]]);
        assert_eq!(loop_field, 0);
    }
}
