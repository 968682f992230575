//! cpal-backed microphone capture and clock-scheduled playback.

use cpal::traits::{DeviceTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tutor_core::audio_host::{AudioHost, CaptureStream, PlaybackContext, SourceId};
use tutor_core::error::SessionError;
use tutor_core::pcm::AudioBuffer;
use tutor_native_utils::audio::{BlockChunker, StreamResampler, downmix, resample};
use tutor_native_utils::device;

/// Capture blocks buffered between the audio thread and the session.
const CAPTURE_QUEUE_CAPACITY: usize = 32;

pub struct NativeAudioHost {
    input_device: Option<String>,
    output_device: Option<String>,
}

impl NativeAudioHost {
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        Self {
            input_device,
            output_device,
        }
    }
}

impl AudioHost for NativeAudioHost {
    fn request_microphone(
        &mut self,
        sample_rate: u32,
        block_size: usize,
    ) -> Result<Box<dyn CaptureStream>, SessionError> {
        let capture = NativeCapture::open(self.input_device.clone(), sample_rate, block_size)
            .map_err(|e| SessionError::PermissionDenied(format!("{:#}", e)))?;
        Ok(Box::new(capture))
    }

    fn open_playback(&mut self, sample_rate: u32) -> Result<Box<dyn PlaybackContext>, SessionError> {
        let playback = NativePlayback::open(self.output_device.clone(), sample_rate)
            .map_err(|e| SessionError::Playback(format!("{:#}", e)))?;
        Ok(Box::new(playback))
    }
}

type Tap = Arc<Mutex<Option<mpsc::Sender<Vec<f32>>>>>;

/// Microphone stream converted to mono blocks at the requested rate.
pub struct NativeCapture {
    stream: Option<cpal::Stream>,
    tap: Tap,
}

impl NativeCapture {
    fn open(device_name: Option<String>, sample_rate: u32, block_size: usize) -> anyhow::Result<Self> {
        let input = device::get_or_default_input(device_name)?;
        tracing::info!("Using input device: {:?}", input.name()?);
        let config = input.default_input_config()?.config();
        tracing::info!("Input stream config: {:?}", &config);

        let channels = config.channels as usize;
        let mut resampler = StreamResampler::new(config.sample_rate.0 as f64, sample_rate as f64)?;
        let mut chunker = BlockChunker::new(block_size);
        let tap: Tap = Arc::new(Mutex::new(None));
        let callback_tap = tap.clone();

        let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let Ok(guard) = callback_tap.lock() else {
                return;
            };
            // Nothing is kept from before the tap is attached.
            let Some(tx) = guard.as_ref() else {
                return;
            };
            let mono = downmix(data, channels);
            let resampled = match resampler.process(&mono) {
                Ok(resampled) => resampled,
                Err(e) => {
                    tracing::error!("Failed to resample input: {}", e);
                    return;
                }
            };
            for block in chunker.push(&resampled) {
                if let Err(e) = tx.try_send(block) {
                    tracing::warn!("Failed to queue capture block: {}", e);
                }
            }
        };

        let stream = input.build_input_stream(
            &config,
            input_data_fn,
            move |err| tracing::error!("An error occurred on input stream: {}", err),
            None,
        )?;
        stream.play()?;

        Ok(Self {
            stream: Some(stream),
            tap,
        })
    }
}

impl CaptureStream for NativeCapture {
    fn attach_tap(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, SessionError> {
        if self.stream.is_none() {
            return Err(SessionError::PermissionDenied(
                "microphone already released".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(CAPTURE_QUEUE_CAPACITY);
        let mut tap = self
            .tap
            .lock()
            .map_err(|_| SessionError::PermissionDenied("capture tap poisoned".to_string()))?;
        *tap = Some(tx);
        Ok(rx)
    }

    fn release(&mut self) {
        if let Ok(mut tap) = self.tap.lock() {
            tap.take();
        }
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("Failed to pause input stream: {}", e);
            }
            tracing::info!("Microphone released");
        }
    }
}

struct Source {
    id: SourceId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl Source {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Output clock shared with the audio thread. One frame is one tick.
struct Timeline {
    frame: u64,
    rate: u32,
    sources: Vec<Source>,
    finished: Vec<SourceId>,
}

impl Timeline {
    fn new(rate: u32) -> Self {
        Self {
            frame: 0,
            rate,
            sources: Vec::new(),
            finished: Vec::new(),
        }
    }

    fn seconds(&self) -> f64 {
        self.frame as f64 / self.rate as f64
    }

    /// Mixes active sources into an interleaved output buffer and advances the clock.
    fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in data.chunks_mut(channels) {
            let now = self.frame;
            let mut mixed = 0.0f32;
            for source in &self.sources {
                if now >= source.start_frame && now < source.end_frame() {
                    mixed += source.samples[(now - source.start_frame) as usize];
                }
            }
            let mixed = mixed.clamp(-1.0, 1.0);
            for sample in frame.iter_mut() {
                *sample = mixed;
            }
            self.frame += 1;
        }

        let now = self.frame;
        let finished = &mut self.finished;
        self.sources.retain(|source| {
            if source.end_frame() <= now {
                finished.push(source.id);
                false
            } else {
                true
            }
        });
    }
}

/// Playback context on a cpal output stream.
pub struct NativePlayback {
    stream: Option<cpal::Stream>,
    timeline: Arc<Mutex<Timeline>>,
    next_id: u64,
}

impl NativePlayback {
    fn open(device_name: Option<String>, sample_rate: u32) -> anyhow::Result<Self> {
        let output = device::get_or_default_output(device_name)?;
        tracing::info!("Using output device: {:?}", output.name()?);
        let config = output.default_output_config()?.config();
        tracing::info!(
            "Output stream config: {:?} (model audio at {} Hz)",
            &config,
            sample_rate
        );

        let channels = config.channels as usize;
        let timeline = Arc::new(Mutex::new(Timeline::new(config.sample_rate.0)));
        let callback_timeline = timeline.clone();

        let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            match callback_timeline.lock() {
                Ok(mut timeline) => timeline.render(data, channels),
                Err(_) => data.fill(0.0),
            }
        };

        let stream = output.build_output_stream(
            &config,
            output_data_fn,
            move |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )?;
        stream.play()?;

        Ok(Self {
            stream: Some(stream),
            timeline,
            next_id: 0,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Timeline>, SessionError> {
        self.timeline
            .lock()
            .map_err(|_| SessionError::Playback("playback timeline poisoned".to_string()))
    }
}

impl PlaybackContext for NativePlayback {
    fn current_time(&self) -> f64 {
        self.lock().map(|t| t.seconds()).unwrap_or(0.0)
    }

    fn start(&mut self, buffer: AudioBuffer, at: f64) -> Result<SourceId, SessionError> {
        if self.stream.is_none() {
            return Err(SessionError::Playback("output stream closed".to_string()));
        }
        let device_rate = self.lock()?.rate;
        let mono = downmix(&buffer.samples, buffer.channels as usize);
        let samples = resample(&mono, buffer.sample_rate as f64, device_rate as f64)
            .map_err(|e| SessionError::Playback(e.to_string()))?;

        self.next_id += 1;
        let id = SourceId(self.next_id);
        let start_frame = (at.max(0.0) * device_rate as f64).round() as u64;
        self.lock()?.sources.push(Source {
            id,
            start_frame,
            samples,
        });
        Ok(id)
    }

    fn stop(&mut self, id: SourceId) {
        if let Ok(mut timeline) = self.lock() {
            timeline.sources.retain(|source| source.id != id);
        }
    }

    fn take_finished(&mut self) -> Vec<SourceId> {
        self.lock()
            .map(|mut t| std::mem::take(&mut t.finished))
            .unwrap_or_default()
    }

    fn close(&mut self) {
        if let Ok(mut timeline) = self.lock() {
            timeline.sources.clear();
            timeline.finished.clear();
        }
        if self.stream.take().is_some() {
            tracing::info!("Output stream closed");
        }
    }
}
