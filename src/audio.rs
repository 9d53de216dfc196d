//! WAV handling and the MP3 encoder contract
//!
//! Captured PCM is exported as canonical 16-bit 44.1 kHz stereo WAV.
//! Foreign WAV input is normalised to that same shape before it is
//! embedded or MP3-encoded. The MP3 encoder itself (LAME or equivalent)
//! stays behind a trait; the core never links a codec.

use crate::error::{Error, Result};

/// Target sample rate for everything this tool produces
pub const SAMPLE_RATE: u32 = 44_100;

/// Audio payload format codes, as stored in the FM9 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AudioFormat {
    None = 0,
    Wav = 1,
    Mp3 = 2,
}

/// Black-box MP3 encoder contract. Input is interleaved 16-bit stereo
/// at 44.1 kHz.
pub trait Mp3Encoder {
    fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>>;
}

/// Detect an audio payload format from magic bytes
pub fn detect_audio_format(data: &[u8]) -> AudioFormat {
    if data.len() >= 4 {
        if &data[0..4] == b"RIFF" {
            return AudioFormat::Wav;
        }
        // ID3 tag or MPEG frame sync
        if &data[0..3] == b"ID3" || (data[0] == 0xFF && data[1] & 0xE0 == 0xE0) {
            return AudioFormat::Mp3;
        }
    }
    AudioFormat::None
}

/// Build a canonical WAV file from interleaved 16-bit 44.1 kHz stereo PCM
pub fn write_wav(pcm: &[i16]) -> Vec<u8> {
    let data_size = (pcm.len() * 2) as u32;
    let mut wav = Vec::with_capacity(44 + data_size as usize);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&2u16.to_le_bytes()); // stereo
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2 * 2).to_le_bytes());
    wav.extend_from_slice(&4u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for sample in pcm {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

/// Parsed WAV format description
#[derive(Debug, Clone, Default)]
struct WavInfo {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    /// 1 = integer PCM, 3 = IEEE float
    audio_format: u16,
    data_offset: usize,
    data_size: usize,
}

/// Walk the RIFF chunks for the fmt and data descriptions
fn parse_wav_header(data: &[u8]) -> Result<WavInfo> {
    if data.len() < 44 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(Error::BadMagic { expected: "RIFF" });
    }

    let mut info = WavInfo::default();
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = u32::from_le_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]) as usize;

        if chunk_id == b"fmt " && pos + 8 + 16 <= data.len() {
            info.audio_format = u16::from_le_bytes([data[pos + 8], data[pos + 9]]);
            info.channels = u16::from_le_bytes([data[pos + 10], data[pos + 11]]);
            info.sample_rate = u32::from_le_bytes([
                data[pos + 12],
                data[pos + 13],
                data[pos + 14],
                data[pos + 15],
            ]);
            info.bits_per_sample = u16::from_le_bytes([data[pos + 22], data[pos + 23]]);
        } else if chunk_id == b"data" {
            info.data_offset = pos + 8;
            info.data_size = chunk_size;
            break;
        }

        // Chunks are 2-byte aligned
        pos += 8 + chunk_size + (chunk_size & 1);
    }

    let supported_pcm = info.audio_format == 1
        && matches!(info.bits_per_sample, 8 | 16 | 24 | 32);
    let supported_float = info.audio_format == 3 && info.bits_per_sample == 32;

    if info.sample_rate == 0
        || info.channels == 0
        || info.channels > 2
        || info.data_size == 0
        || !(supported_pcm || supported_float)
    {
        return Err(Error::UnsupportedFormat(
            "WAV must be PCM 8/16/24/32-bit or 32-bit float, mono or stereo".into(),
        ));
    }
    if info.data_offset + info.data_size > data.len() {
        return Err(Error::InputTruncated {
            offset: info.data_offset,
            what: "WAV data chunk",
        });
    }

    Ok(info)
}

/// Widen/narrow one source sample to 16-bit
fn sample_to_i16(bytes: &[u8], info: &WavInfo) -> i16 {
    let v: i32 = if info.audio_format == 3 {
        let f = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        (f * 32767.0) as i32
    } else {
        match info.bits_per_sample {
            8 => (bytes[0] as i32 - 128) * 256,
            16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
            24 => {
                let mut s = bytes[0] as i32 | (bytes[1] as i32) << 8 | (bytes[2] as i32) << 16;
                if s & 0x80_0000 != 0 {
                    s |= !0xFF_FFFF;
                }
                s >> 8
            }
            _ => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) >> 16,
        }
    };
    v.clamp(-32768, 32767) as i16
}

/// Resample with linear interpolation, widening mono to stereo
fn resample_linear(src: &[i16], channels: usize, src_rate: u32, dst_rate: u32) -> Vec<i16> {
    let src_frames = src.len() / channels;
    if src_frames == 0 {
        return Vec::new();
    }
    let dst_frames =
        ((src_frames as f64) * (dst_rate as f64) / (src_rate as f64) + 0.5) as usize;
    let ratio = src_rate as f64 / dst_rate as f64;

    let mut dst = Vec::with_capacity(dst_frames * 2);
    for i in 0..dst_frames {
        let src_pos = i as f64 * ratio;
        let mut idx = src_pos as usize;
        let mut frac = src_pos - idx as f64;
        if idx >= src_frames - 1 {
            idx = src_frames - 1;
            frac = 0.0;
        }

        for ch in 0..2 {
            let src_ch = if channels == 1 { 0 } else { ch };
            let s0 = src[idx * channels + src_ch] as f64;
            let s1 = if idx + 1 < src_frames {
                src[(idx + 1) * channels + src_ch] as f64
            } else {
                s0
            };
            let sample = (s0 * (1.0 - frac) + s1 * frac) as i32;
            dst.push(sample.clamp(-32768, 32767) as i16);
        }
    }
    dst
}

/// Decode a WAV file to interleaved 16-bit 44.1 kHz stereo PCM
pub fn decode_wav(data: &[u8]) -> Result<Vec<i16>> {
    let info = parse_wav_header(data)?;

    let bytes_per_sample = (info.bits_per_sample / 8) as usize;
    let total_samples = info.data_size / bytes_per_sample;
    let src_bytes = &data[info.data_offset..info.data_offset + info.data_size];

    let mut native = Vec::with_capacity(total_samples);
    for i in 0..total_samples {
        let at = i * bytes_per_sample;
        native.push(sample_to_i16(&src_bytes[at..at + bytes_per_sample], &info));
    }

    if info.sample_rate == SAMPLE_RATE && info.channels == 2 {
        Ok(native)
    } else {
        Ok(resample_linear(
            &native,
            info.channels as usize,
            info.sample_rate,
            SAMPLE_RATE,
        ))
    }
}

/// Normalise arbitrary WAV input to canonical 16-bit 44.1 kHz stereo.
/// Input already in that shape is returned unchanged.
pub fn normalize_wav(data: &[u8]) -> Result<Vec<u8>> {
    let info = parse_wav_header(data)?;

    if info.sample_rate == SAMPLE_RATE
        && info.channels == 2
        && info.bits_per_sample == 16
        && info.audio_format == 1
    {
        return Ok(data.to_vec());
    }

    let pcm = decode_wav(data)?;
    Ok(write_wav(&pcm))
}

/// Normalise WAV input and feed it to an MP3 encoder
pub fn encode_wav_to_mp3(encoder: &mut dyn Mp3Encoder, wav_data: &[u8]) -> Result<Vec<u8>> {
    let pcm = decode_wav(wav_data)?;
    encoder.encode(&pcm)
}

/// Prepare the audio payload for embedding from WAV input. MP3-encode
/// when an encoder is available; if encoding fails, embed the normalised
/// WAV instead of aborting the conversion.
pub fn prepare_payload(
    wav_data: &[u8],
    encoder: Option<&mut dyn Mp3Encoder>,
) -> Result<(Vec<u8>, AudioFormat)> {
    if let Some(enc) = encoder {
        match encode_wav_to_mp3(enc, wav_data) {
            Ok(mp3) => return Ok((mp3, AudioFormat::Mp3)),
            Err(e) => {
                tracing::warn!(error = %e, "MP3 encoding failed, embedding WAV instead");
            }
        }
    }
    Ok((normalize_wav(wav_data)?, AudioFormat::Wav))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_shape() {
        let wav = write_wav(&[0, 0, 100, -100]);
        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 8);
    }

    #[test]
    fn test_standard_wav_unchanged() {
        let wav = write_wav(&[1, 2, 3, 4]);
        assert_eq!(normalize_wav(&wav).unwrap(), wav);
    }

    #[test]
    fn test_mono_widened_to_stereo() {
        // Build an 8-bit mono WAV at 44100 by hand
        let samples: &[u8] = &[128, 255, 0, 128];
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&8u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(samples.len() as u32).to_le_bytes());
        wav.extend_from_slice(samples);

        let pcm = decode_wav(&wav).unwrap();
        assert_eq!(pcm.len(), samples.len() * 2);
        // 8-bit midpoint maps to zero, and both channels carry it
        assert_eq!(pcm[0], 0);
        assert_eq!(pcm[1], 0);
    }

    #[test]
    fn test_detect_formats() {
        assert_eq!(detect_audio_format(b"RIFFxxxxWAVE"), AudioFormat::Wav);
        assert_eq!(detect_audio_format(b"ID3\x04rest"), AudioFormat::Mp3);
        assert_eq!(detect_audio_format(&[0xFF, 0xFB, 0x90, 0x00]), AudioFormat::Mp3);
        assert_eq!(detect_audio_format(b"Vgm "), AudioFormat::None);
    }

    #[test]
    fn test_bad_wav_rejected() {
        assert!(normalize_wav(b"RIFFnope").is_err());
        assert!(normalize_wav(&[]).is_err());
    }

    struct StubEncoder {
        fail: bool,
    }

    impl Mp3Encoder for StubEncoder {
        fn encode(&mut self, pcm: &[i16]) -> crate::error::Result<Vec<u8>> {
            if self.fail {
                Err(Error::UnsupportedFormat("encoder broke".into()))
            } else {
                Ok(vec![0xFF, 0xFB, pcm.len() as u8])
            }
        }
    }

    #[test]
    fn test_payload_prefers_mp3() {
        let wav = write_wav(&[1, 2, 3, 4]);
        let mut enc = StubEncoder { fail: false };
        let (data, format) = prepare_payload(&wav, Some(&mut enc)).unwrap();
        assert_eq!(format, AudioFormat::Mp3);
        assert_eq!(data[0], 0xFF);
    }

    #[test]
    fn test_payload_falls_back_to_wav() {
        let wav = write_wav(&[1, 2, 3, 4]);
        let mut enc = StubEncoder { fail: true };
        let (data, format) = prepare_payload(&wav, Some(&mut enc)).unwrap();
        assert_eq!(format, AudioFormat::Wav);
        assert_eq!(data, wav);
    }

    #[test]
    fn test_payload_without_encoder() {
        let wav = write_wav(&[9, 9]);
        let (data, format) = prepare_payload(&wav, None).unwrap();
        assert_eq!(format, AudioFormat::Wav);
        assert_eq!(data, wav);
    }
}
