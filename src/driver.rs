//! Capture driver loops and loop-point discovery
//!
//! Upstream players only report "still playing"; they never say "looped".
//! The driver polls the player's ordinal position each tick and remembers
//! the first sighting of every position. When the player finishes at a
//! position earlier than the one before, the song looped, and the first
//! sighting of the target tells the capture chip where the loop starts in
//! its write buffer.

use crate::capture::{ActiveCapture, CaptureChip, OplSink};
use std::collections::HashMap;

/// Contract implemented by native-OPL and tracker players. Each tick the
/// player writes whatever registers the song calls for into the sink it
/// is handed; the driver paces it and watches its position.
pub trait TrackerPlayer {
    /// Advance one tick; false once the song has finished
    fn tick(&mut self, opl: &mut dyn OplSink) -> bool;

    /// Ordinal position within the song's order list
    fn order_index(&self) -> u32;

    /// Tick rate in Hz; may be non-integer
    fn refresh_hz(&self) -> f32;
}

/// Contract implemented by the upstream MIDI synthesizer. One call renders
/// one sample frame through the capture chip.
pub trait MidiPlayer {
    fn render_frame(&mut self, chip: &mut ActiveCapture) -> bool;
}

/// First-sighting table: order position -> (sample position, write index)
#[derive(Debug, Default)]
pub struct LoopTracker {
    first_seen: HashMap<u32, (u32, usize)>,
}

impl LoopTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first time each order position is observed
    pub fn observe(&mut self, order: u32, sample_pos: u32, write_index: usize) {
        self.first_seen
            .entry(order)
            .or_insert((sample_pos, write_index));
    }

    /// Where was this order position first seen, if at all
    pub fn first_sighting(&self, order: u32) -> Option<(u32, usize)> {
        self.first_seen.get(&order).copied()
    }
}

/// Driver options
#[derive(Debug, Clone)]
pub struct DriveOptions {
    /// Hard sample budget (worst-case work bound)
    pub max_samples: u32,
    /// Whether to resolve loop points at all
    pub detect_loop: bool,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            // 600 seconds at 44100 Hz
            max_samples: 600 * 44_100,
            detect_loop: true,
        }
    }
}

/// What a drive run did
#[derive(Debug, Clone, Default)]
pub struct DriveSummary {
    pub samples: u32,
    pub ticks: u32,
    pub loop_detected: bool,
}

/// Drive a tracker-style player into the passive capture chip until it
/// finishes or the sample budget runs out.
pub fn drive_tracker(
    player: &mut dyn TrackerPlayer,
    chip: &mut CaptureChip,
    opts: &DriveOptions,
) -> DriveSummary {
    let mut summary = DriveSummary::default();
    let mut tracker = LoopTracker::new();

    // Fractional sample residue; only whole samples are consumed per tick
    // so non-integer refresh rates cannot drift
    let mut fractional: f64 = 0.0;
    let mut prev_order = player.order_index();

    while summary.samples < opts.max_samples {
        let mut refresh = player.refresh_hz();
        if refresh <= 0.0 || refresh > 10_000.0 {
            refresh = 70.0;
        }

        let curr_order = player.order_index();
        if opts.detect_loop {
            tracker.observe(curr_order, summary.samples, chip.write_count());
        }
        prev_order = curr_order;

        let still_playing = player.tick(chip);

        fractional += 44_100.0 / refresh as f64;
        let samples = fractional as u32;
        fractional -= samples as f64;

        chip.advance_samples(samples);
        summary.samples += samples;
        summary.ticks += 1;

        if !still_playing {
            let end_order = player.order_index();
            // Backwards motion (or a return to the start) means a loop;
            // anything else is a genuine end
            if end_order < prev_order || (end_order == 0 && prev_order > 0) {
                summary.loop_detected = true;
                if opts.detect_loop {
                    match tracker.first_sighting(end_order) {
                        Some((sample_pos, write_index)) => {
                            chip.set_loop_point(write_index, sample_pos);
                        }
                        None => {
                            tracing::warn!(
                                order = end_order,
                                "loop target never seen during capture; emitting without loop"
                            );
                        }
                    }
                }
            }
            break;
        }
    }

    summary
}

/// Drive a MIDI synthesizer into the active capture chip, one sample
/// frame per iteration.
pub fn drive_midi(
    player: &mut dyn MidiPlayer,
    chip: &mut ActiveCapture,
    max_samples: u32,
) -> u32 {
    let mut samples = 0u32;
    while samples < max_samples && player.render_frame(chip) {
        chip.advance_samples(1);
        samples += 1;
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Player that walks a fixed order list, writing one register per tick
    struct ScriptedPlayer<'a> {
        orders: &'a [u32],
        pos: usize,
    }

    impl TrackerPlayer for ScriptedPlayer<'_> {
        fn tick(&mut self, opl: &mut dyn OplSink) -> bool {
            opl.write_register(0xB0, (0x20 + self.pos) as u8);
            self.pos += 1;
            // The last order entry is where the player lands after the
            // finishing tick (the loop target, or the final order)
            self.pos < self.orders.len() - 1
        }

        fn order_index(&self) -> u32 {
            self.orders[self.pos.min(self.orders.len() - 1)]
        }

        fn refresh_hz(&self) -> f32 {
            70.0
        }
    }

    #[test]
    fn test_integer_refresh_has_no_drift() {
        let mut chip = CaptureChip::new();
        let orders = [0u32; 71];
        let mut player = ScriptedPlayer {
            orders: &orders,
            pos: 0,
        };
        let summary = drive_tracker(&mut player, &mut chip, &DriveOptions::default());
        // 44100 / 70 = 630 exactly; 70 ticks = one second
        assert_eq!(summary.samples, 44_100);
        assert_eq!(summary.ticks, 70);
    }

    #[test]
    fn test_fractional_refresh_accumulates() {
        struct FractionalPlayer {
            ticks: u32,
        }
        impl TrackerPlayer for FractionalPlayer {
            fn tick(&mut self, _opl: &mut dyn OplSink) -> bool {
                self.ticks += 1;
                self.ticks < 5994
            }
            fn order_index(&self) -> u32 {
                0
            }
            fn refresh_hz(&self) -> f32 {
                59.94
            }
        }

        let mut chip = CaptureChip::new();
        let mut player = FractionalPlayer { ticks: 0 };
        let summary = drive_tracker(&mut player, &mut chip, &DriveOptions::default());
        // 5994 ticks at 59.94 Hz is 100 seconds; the residue keeps the
        // total within one sample of exact
        let expected = 100 * 44_100;
        assert!((summary.samples as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn test_bad_refresh_clamped() {
        struct BadRefresh {
            ticks: u32,
        }
        impl TrackerPlayer for BadRefresh {
            fn tick(&mut self, _opl: &mut dyn OplSink) -> bool {
                self.ticks += 1;
                self.ticks < 70
            }
            fn order_index(&self) -> u32 {
                0
            }
            fn refresh_hz(&self) -> f32 {
                -1.0
            }
        }

        let mut chip = CaptureChip::new();
        let mut player = BadRefresh { ticks: 0 };
        let summary = drive_tracker(&mut player, &mut chip, &DriveOptions::default());
        assert_eq!(summary.samples, 44_100);
    }

    #[test]
    fn test_loop_detection_back_jump() {
        let mut chip = CaptureChip::new();
        // Plays orders 0,1,2,3 then reports finished back at order 2
        let orders = [0, 1, 2, 3, 2];
        let mut player = ScriptedPlayer {
            orders: &orders,
            pos: 0,
        };
        let summary = drive_tracker(&mut player, &mut chip, &DriveOptions::default());
        assert!(summary.loop_detected);
        assert!(chip.has_loop_point());
    }

    #[test]
    fn test_no_loop_on_clean_end() {
        let mut chip = CaptureChip::new();
        let orders = [0, 1, 2, 3, 3];
        let mut player = ScriptedPlayer {
            orders: &orders,
            pos: 0,
        };
        let summary = drive_tracker(&mut player, &mut chip, &DriveOptions::default());
        assert!(!summary.loop_detected);
        assert!(!chip.has_loop_point());
    }

    #[test]
    fn test_sample_budget_bounds_work() {
        struct Endless;
        impl TrackerPlayer for Endless {
            fn tick(&mut self, _opl: &mut dyn OplSink) -> bool {
                true
            }
            fn order_index(&self) -> u32 {
                0
            }
            fn refresh_hz(&self) -> f32 {
                70.0
            }
        }

        let mut chip = CaptureChip::new();
        let opts = DriveOptions {
            max_samples: 6300,
            detect_loop: true,
        };
        let summary = drive_tracker(&mut Endless, &mut chip, &opts);
        assert_eq!(summary.samples, 6300);
    }

    #[test]
    fn test_loop_tracker_keeps_first_sighting() {
        let mut tracker = LoopTracker::new();
        tracker.observe(5, 100, 10);
        tracker.observe(5, 999, 99);
        assert_eq!(tracker.first_sighting(5), Some((100, 10)));
        assert_eq!(tracker.first_sighting(6), None);
    }
}
