use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::collections::VecDeque;

/// Chunk size used when resampling a whole buffer in one go.
pub const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits a slice of audio samples into a vector of vectors, where each inner vector has a fixed chunk size.
/// If a chunk is smaller than the `chunk_size`, it is padded with zeros.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Resamples a complete mono buffer.
///
/// The output has exactly `len * out / in` samples (rounded), with the
/// resampler's delay line trimmed from the front and flushed at the back, so
/// consecutive buffers line up without gaps.
pub fn resample(samples: &[f32], in_rate: f64, out_rate: f64) -> anyhow::Result<Vec<f32>> {
    if samples.is_empty() || (in_rate - out_rate).abs() < f64::EPSILON {
        return Ok(samples.to_vec());
    }

    let mut resampler = create_resampler(in_rate, out_rate, RESAMPLE_CHUNK_SIZE)?;
    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * out_rate / in_rate).round() as usize;
    let chunk_size = resampler.input_frames_next();

    let mut chunks = split_for_chunks(samples, chunk_size);
    // One extra chunk of silence pushes the last real samples out of the delay line.
    chunks.push(vec![0.0; chunk_size]);

    let mut out = Vec::with_capacity(expected + delay + chunk_size);
    for chunk in chunks {
        let resampled = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }

    let end = (delay + expected).min(out.len());
    let start = delay.min(end);
    let mut trimmed = out[start..end].to_vec();
    trimmed.resize(expected, 0.0);
    Ok(trimmed)
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// Re-cuts an arbitrary stream of samples into fixed-size blocks.
///
/// Device callbacks deliver whatever buffer size the host picks; the
/// streaming protocol wants uniform blocks.
#[derive(Debug)]
pub struct BlockChunker {
    block_size: usize,
    pending: VecDeque<f32>,
}

impl BlockChunker {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            pending: VecDeque::with_capacity(block_size * 2),
        }
    }

    /// Appends samples and returns every block that is now complete.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend(samples.iter().copied());
        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            blocks.push(self.pending.drain(..self.block_size).collect());
        }
        blocks
    }
}

/// Resamples a live stream whose callbacks deliver arbitrary buffer sizes.
///
/// Input is cut into `RESAMPLE_CHUNK_SIZE` frames for the resampler, so up
/// to one chunk of audio is held back until the next call.
pub struct StreamResampler {
    resampler: Option<FastFixedIn<f32>>,
    chunker: BlockChunker,
}

impl StreamResampler {
    pub fn new(in_rate: f64, out_rate: f64) -> anyhow::Result<Self> {
        let resampler = if (in_rate - out_rate).abs() < f64::EPSILON {
            None
        } else {
            Some(create_resampler(in_rate, out_rate, RESAMPLE_CHUNK_SIZE)?)
        };
        Ok(Self {
            resampler,
            chunker: BlockChunker::new(RESAMPLE_CHUNK_SIZE),
        })
    }

    pub fn process(&mut self, samples: &[f32]) -> anyhow::Result<Vec<f32>> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(samples.to_vec());
        };
        let mut out = Vec::new();
        for chunk in self.chunker.push(samples) {
            let resampled = resampler.process(&[chunk.as_slice()], None)?;
            if let Some(channel) = resampled.first() {
                out.extend_from_slice(channel);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_resampler_passthrough_and_rate() {
        let mut same = StreamResampler::new(16000.0, 16000.0).unwrap();
        assert_eq!(same.process(&[0.5; 10]).unwrap(), vec![0.5; 10]);

        let mut down = StreamResampler::new(48000.0, 16000.0).unwrap();
        assert!(down.process(&[0.0; 500]).unwrap().is_empty());
        let mut produced = 0;
        for _ in 0..30 {
            produced += down.process(&[0.0; 480]).unwrap().len();
        }
        // 15000 input frames at a third of the rate, minus what is still buffered.
        assert!(produced > 4000 && produced <= 5000, "produced {}", produced);
    }

    #[test]
    fn test_split_for_chunks_pads_last_chunk() {
        let chunks = split_for_chunks(&[1.0, 2.0, 3.0], 2);
        assert_eq!(chunks, vec![vec![1.0, 2.0], vec![3.0, 0.0]]);
    }

    #[test]
    fn test_resample_same_rate_is_passthrough() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&samples, 24000.0, 24000.0).unwrap(), samples);
    }

    #[test]
    fn test_resample_produces_expected_length() {
        let samples = vec![0.25; 2400];
        let out = resample(&samples, 24000.0, 48000.0).unwrap();
        assert_eq!(out.len(), 4800);

        let out = resample(&samples, 24000.0, 44100.0).unwrap();
        assert_eq!(out.len(), 4410);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        assert_eq!(downmix(&stereo, 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn test_block_chunker_emits_only_full_blocks() {
        let mut chunker = BlockChunker::new(4);

        assert!(chunker.push(&[0.0; 3]).is_empty());

        let blocks = chunker.push(&[1.0; 6]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(blocks[1], vec![1.0; 4]);

        let blocks = chunker.push(&[2.0; 3]);
        assert_eq!(blocks, vec![vec![1.0, 2.0, 2.0, 2.0]]);
    }
}
