use crate::error::DecodeError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Sample rate of microphone audio sent upstream.
pub const INPUT_SAMPLE_RATE: u32 = 16000;
/// Sample rate of audio the model sends back.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;
/// Mono samples per capture block.
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// One capture block, ready to be sent as realtime media input.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBlob {
    pub data: String,
    pub mime_type: String,
}

/// Encodes float samples as base64 little-endian signed 16-bit PCM.
///
/// Each sample is scaled by 32768 and saturated into `i16`, so `1.0` maps to
/// `32767` and `-1.0` to `-32768`.
pub fn encode_pcm_frame(samples: &[f32]) -> PcmBlob {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let value = (sample * 32768.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    PcmBlob {
        data: STANDARD.encode(bytes),
        mime_type: INPUT_MIME_TYPE.to_string(),
    }
}

/// Decoded model audio, interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decodes a base64 little-endian signed 16-bit PCM payload.
///
/// Samples are mapped back to floats by dividing by 32768.
pub fn decode_pcm16(
    data: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<AudioBuffer, DecodeError> {
    if channels == 0 {
        return Err(DecodeError::NoChannels);
    }
    let bytes = STANDARD.decode(data.trim())?;
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }
    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    let frame_count = samples.len() / channels as usize;
    if frame_count == 0 {
        return Err(DecodeError::Empty);
    }
    let mut samples = samples;
    samples.truncate(frame_count * channels as usize);

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_bytes(blob: &PcmBlob) -> Vec<u8> {
        STANDARD.decode(&blob.data).unwrap()
    }

    #[test]
    fn test_encode_scales_and_saturates() {
        let blob = encode_pcm_frame(&[0.0, 0.5, -1.0, 1.0, 1.5]);
        let bytes = raw_bytes(&blob);
        let values: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect();

        assert_eq!(values, vec![0, 16384, -32768, 32767, 32767]);
        assert_eq!(blob.mime_type, "audio/pcm;rate=16000");
    }

    #[test]
    fn test_encode_block_size() {
        let blob = encode_pcm_frame(&vec![0.1; CAPTURE_BLOCK_SIZE]);
        assert_eq!(raw_bytes(&blob).len(), 8192);
    }

    #[test]
    fn test_encode_decode_round_trip_is_close() {
        let input = [0.25, -0.75, 0.999, -0.001];
        let blob = encode_pcm_frame(&input);
        let decoded = decode_pcm16(&blob.data, INPUT_SAMPLE_RATE, 1).unwrap();

        assert_eq!(decoded.samples.len(), input.len());
        for (a, b) in input.iter().zip(decoded.samples.iter()) {
            assert!((a - b).abs() <= 1.0 / 32768.0 + f32::EPSILON);
        }
    }

    #[test]
    fn test_decode_duration() {
        // 4800 mono samples at 24 kHz last 0.2 s.
        let data = STANDARD.encode(vec![0u8; 9600]);
        let buffer = decode_pcm16(&data, OUTPUT_SAMPLE_RATE, 1).unwrap();
        assert_eq!(buffer.frames(), 4800);
        assert!((buffer.duration() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(matches!(
            decode_pcm16("!!not base64!!", OUTPUT_SAMPLE_RATE, 1),
            Err(DecodeError::Base64(_))
        ));
        assert!(matches!(
            decode_pcm16(&STANDARD.encode([1u8, 2, 3]), OUTPUT_SAMPLE_RATE, 1),
            Err(DecodeError::OddLength(3))
        ));
        assert!(matches!(
            decode_pcm16("", OUTPUT_SAMPLE_RATE, 1),
            Err(DecodeError::Empty)
        ));
        assert!(matches!(
            decode_pcm16("AAAA", OUTPUT_SAMPLE_RATE, 0),
            Err(DecodeError::NoChannels)
        ));
    }

    #[test]
    fn test_stereo_frames() {
        let buffer = AudioBuffer {
            samples: vec![0.1, 0.2, 0.3, 0.4],
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: 2,
        };
        assert_eq!(buffer.frames(), 2);
        assert!((buffer.duration() - 2.0 / OUTPUT_SAMPLE_RATE as f64).abs() < 1e-12);
    }
}
