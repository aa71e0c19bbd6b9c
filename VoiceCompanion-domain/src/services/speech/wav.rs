//! PCM/WAV helpers for recognizer input and the local synthesizer

use std::f64::consts::PI;

/// Recording format clients stream: 16 kHz, mono, 16-bit little endian
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

pub fn has_wav_header(audio: &[u8]) -> bool {
    audio.len() >= 12 && &audio[0..4] == b"RIFF" && &audio[8..12] == b"WAVE"
}

/// 44-byte canonical PCM header for `data_size` bytes of samples
pub fn wav_header(data_size: u32, sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * block_align as u32;

    let mut header = Vec::with_capacity(44);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + data_size).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&bits_per_sample.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());
    header
}

/// Prefix raw PCM with a WAV header; audio that already has one is returned as is
pub fn ensure_wav(audio: Vec<u8>) -> Vec<u8> {
    if has_wav_header(&audio) {
        return audio;
    }
    let mut wav = wav_header(audio.len() as u32, SAMPLE_RATE, CHANNELS, BITS_PER_SAMPLE);
    wav.extend_from_slice(&audio);
    wav
}

/// Prosody of the generated tone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneShape {
    pub pitch: f64,
    pub volume: f64,
}

/// Speech-like tone whose amplitude pattern follows the speaking style
pub fn speech_like_tone(duration_secs: f64, shape: ToneShape, style: &str) -> Vec<u8> {
    let num_samples = (SAMPLE_RATE as f64 * duration_secs) as usize;
    let mut data = Vec::with_capacity(num_samples * 2);

    for i in 0..num_samples {
        let t = i as f64;
        let frequency = (200.0 + (i % 100) as f64) * shape.pitch;
        let base = 0.3 + 0.2 * (t / 100.0).sin();
        let envelope = match style {
            "cheerful" => 1.0 + 0.3 * (t / 50.0).sin(),
            "sad" => 0.7,
            "angry" => 1.0 + 0.5 * (t / 30.0).sin(),
            "worried" => 0.8 + 0.2 * (t / 80.0).sin(),
            "calm" => 0.9,
            _ => 1.0,
        };
        let amplitude = base * shape.volume * envelope;
        let value = 32767.0 * amplitude * (2.0 * PI * frequency * t / SAMPLE_RATE as f64).sin();
        let sample = value.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        data.extend_from_slice(&sample.to_le_bytes());
    }

    let mut wav = wav_header(data.len() as u32, SAMPLE_RATE, CHANNELS, BITS_PER_SAMPLE);
    wav.extend_from_slice(&data);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_wav_wraps_raw_pcm() {
        let pcm = vec![0u8; 320];
        let wav = ensure_wav(pcm);
        assert_eq!(wav.len(), 364);
        assert!(has_wav_header(&wav));
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 16_000);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 320);

        let again = ensure_wav(wav.clone());
        assert_eq!(again, wav);
    }

    #[test]
    fn test_tone_length() {
        let wav = speech_like_tone(1.5, ToneShape { pitch: 1.0, volume: 1.0 }, "neutral");
        assert_eq!(wav.len(), 44 + 24_000 * 2);
    }
}
