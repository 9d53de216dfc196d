//! VGM delay command generation

/// VGM delay commands
pub mod cmd {
    /// Wait n samples (16-bit)
    pub const WAIT_NNNN: u8 = 0x61;
    /// Wait 735 samples (1/60 second at 44100Hz)
    pub const WAIT_60TH: u8 = 0x62;
    /// Wait 882 samples (1/50 second at 44100Hz)
    pub const WAIT_50TH: u8 = 0x63;
    /// End of sound data
    pub const END: u8 = 0x66;
    /// Wait n+1 samples (n = 0-15, command 0x70-0x7F)
    pub const WAIT_N_BASE: u8 = 0x70;
}

/// Generate delay commands for a given duration in samples.
///
/// The shortcut checks run in a fixed order: the NTSC/PAL single-byte
/// waits, then the short wait, then the 16-bit wait, chunking anything
/// larger into maximal 16-bit waits.
pub fn generate_delay(mut duration: u32) -> Vec<u8> {
    let mut commands = Vec::new();

    while duration > 0 {
        if duration == 735 {
            commands.push(cmd::WAIT_60TH);
            break;
        } else if duration == 882 {
            commands.push(cmd::WAIT_50TH);
            break;
        } else if duration <= 16 {
            commands.push(cmd::WAIT_N_BASE + (duration as u8) - 1);
            break;
        } else if duration <= 65535 {
            commands.push(cmd::WAIT_NNNN);
            commands.push((duration & 0xFF) as u8);
            commands.push(((duration >> 8) & 0xFF) as u8);
            break;
        } else {
            commands.push(cmd::WAIT_NNNN);
            commands.push(0xFF);
            commands.push(0xFF);
            duration -= 65535;
        }
    }

    commands
}
