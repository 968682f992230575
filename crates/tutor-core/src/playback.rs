use crate::audio_host::{PlaybackContext, SourceId};
use crate::error::SessionError;
use crate::pcm::decode_pcm16;
use std::collections::HashSet;

/// Where a decoded chunk landed on the playback clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBuffer {
    pub id: SourceId,
    pub start: f64,
    pub duration: f64,
}

/// Queues model audio back to back on the playback clock.
///
/// Each chunk starts where the previous one ends, or now if the queue has
/// drained, so playback is gapless while chunks keep up.
pub struct PlaybackScheduler {
    context: Option<Box<dyn PlaybackContext>>,
    next_start_time: f64,
    active: HashSet<SourceId>,
}

impl PlaybackScheduler {
    pub fn new(context: Box<dyn PlaybackContext>) -> Self {
        Self {
            context: Some(context),
            next_start_time: 0.0,
            active: HashSet::new(),
        }
    }

    /// Decodes one base64 chunk and schedules it after everything already queued.
    ///
    /// A chunk that fails to decode leaves the clock untouched.
    pub fn enqueue(
        &mut self,
        encoded: &str,
        sample_rate: u32,
        channels: u16,
    ) -> Result<ScheduledBuffer, SessionError> {
        let Some(context) = self.context.as_mut() else {
            return Err(SessionError::Playback(
                "playback context already closed".to_string(),
            ));
        };

        let buffer = decode_pcm16(encoded, sample_rate, channels)?;
        let duration = buffer.duration();
        let start = context.current_time().max(self.next_start_time);
        let id = context.start(buffer, start)?;

        self.next_start_time = start + duration;
        self.active.insert(id);
        tracing::debug!(
            "scheduled source {:?} at {:.3}s for {:.3}s",
            id,
            start,
            duration
        );

        Ok(ScheduledBuffer {
            id,
            start,
            duration,
        })
    }

    /// Stops every queued buffer and rewinds the clock.
    pub fn interrupt(&mut self) {
        if let Some(context) = self.context.as_mut() {
            for id in self.active.drain() {
                context.stop(id);
            }
        }
        self.active.clear();
        self.next_start_time = 0.0;
    }

    /// Interrupts, then releases the playback device. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.interrupt();
        if let Some(mut context) = self.context.take() {
            context.close();
            tracing::debug!("playback context closed");
        }
    }

    /// Forgets buffers that have played to the end. Returns how many.
    pub fn reap_finished(&mut self) -> usize {
        let Some(context) = self.context.as_mut() else {
            return 0;
        };
        let mut reaped = 0;
        for id in context.take_finished() {
            if self.active.remove(&id) {
                reaped += 1;
            }
        }
        reaped
    }

    #[cfg(test)]
    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.context.is_none()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pcm::{AudioBuffer, OUTPUT_SAMPLE_RATE};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// What a fake context observed, shared with the test.
    #[derive(Default)]
    pub(crate) struct ContextLog {
        pub now: f64,
        pub started: Vec<(SourceId, f64, f64)>,
        pub stopped: Vec<SourceId>,
        pub finished: Vec<SourceId>,
        pub closes: usize,
    }

    /// Manual-clock playback context.
    pub(crate) struct FakeContext {
        pub log: Rc<RefCell<ContextLog>>,
        next_id: u64,
    }

    impl FakeContext {
        pub fn new() -> (Self, Rc<RefCell<ContextLog>>) {
            let log = Rc::new(RefCell::new(ContextLog::default()));
            (
                Self {
                    log: log.clone(),
                    next_id: 0,
                },
                log,
            )
        }
    }

    impl PlaybackContext for FakeContext {
        fn current_time(&self) -> f64 {
            self.log.borrow().now
        }

        fn start(&mut self, buffer: AudioBuffer, at: f64) -> Result<SourceId, SessionError> {
            self.next_id += 1;
            let id = SourceId(self.next_id);
            self.log.borrow_mut().started.push((id, at, buffer.duration()));
            Ok(id)
        }

        fn stop(&mut self, id: SourceId) {
            self.log.borrow_mut().stopped.push(id);
        }

        fn take_finished(&mut self) -> Vec<SourceId> {
            std::mem::take(&mut self.log.borrow_mut().finished)
        }

        fn close(&mut self) {
            self.log.borrow_mut().closes += 1;
        }
    }

    /// Base64 of `seconds` of silent 24 kHz mono PCM16.
    pub(crate) fn silence(seconds: f64) -> String {
        let samples = (seconds * OUTPUT_SAMPLE_RATE as f64).round() as usize;
        STANDARD.encode(vec![0u8; samples * 2])
    }

    #[test]
    fn test_chunks_are_scheduled_back_to_back() {
        // --- Arrange ---
        let (context, log) = FakeContext::new();
        log.borrow_mut().now = 2.0;
        let mut scheduler = PlaybackScheduler::new(Box::new(context));

        // --- Act ---
        let first = scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();
        log.borrow_mut().now = 2.1;
        let second = scheduler.enqueue(&silence(0.25), OUTPUT_SAMPLE_RATE, 1).unwrap();
        let third = scheduler.enqueue(&silence(1.0), OUTPUT_SAMPLE_RATE, 1).unwrap();

        // --- Assert ---
        assert!((first.start - 2.0).abs() < 1e-9);
        assert!((second.start - 2.5).abs() < 1e-9);
        assert!((third.start - 2.75).abs() < 1e-9);
        assert!((scheduler.next_start_time() - 3.75).abs() < 1e-9);
        assert_eq!(scheduler.active_count(), 3);
    }

    #[test]
    fn test_drained_queue_restarts_at_current_time() {
        let (context, log) = FakeContext::new();
        let mut scheduler = PlaybackScheduler::new(Box::new(context));

        scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();
        log.borrow_mut().now = 4.0;
        let late = scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();

        assert!((late.start - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_interrupt_stops_everything_and_rewinds() {
        // --- Arrange ---
        let (context, log) = FakeContext::new();
        let mut scheduler = PlaybackScheduler::new(Box::new(context));
        scheduler.enqueue(&silence(1.0), OUTPUT_SAMPLE_RATE, 1).unwrap();
        scheduler.enqueue(&silence(1.0), OUTPUT_SAMPLE_RATE, 1).unwrap();

        // --- Act ---
        log.borrow_mut().now = 0.3;
        scheduler.interrupt();
        let next = scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();

        // --- Assert ---
        let mut stopped = log.borrow().stopped.clone();
        stopped.sort();
        assert_eq!(stopped, vec![SourceId(1), SourceId(2)]);
        assert!((next.start - 0.3).abs() < 1e-9);
        assert_eq!(scheduler.active_count(), 1);
    }

    #[test]
    fn test_interrupt_with_nothing_queued_is_noop() {
        let (context, log) = FakeContext::new();
        let mut scheduler = PlaybackScheduler::new(Box::new(context));

        scheduler.interrupt();

        assert!(log.borrow().stopped.is_empty());
        assert_eq!(scheduler.next_start_time(), 0.0);
    }

    #[test]
    fn test_teardown_twice_releases_once() {
        let (context, log) = FakeContext::new();
        let mut scheduler = PlaybackScheduler::new(Box::new(context));
        scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();

        scheduler.teardown();
        scheduler.teardown();

        assert_eq!(log.borrow().closes, 1);
        assert_eq!(log.borrow().stopped, vec![SourceId(1)]);
        assert!(scheduler.is_closed());
        assert!(matches!(
            scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1),
            Err(SessionError::Playback(_))
        ));
    }

    #[test]
    fn test_decode_failure_leaves_clock_untouched() {
        let (context, log) = FakeContext::new();
        let mut scheduler = PlaybackScheduler::new(Box::new(context));
        scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();

        let err = scheduler.enqueue("%%%", OUTPUT_SAMPLE_RATE, 1).unwrap_err();

        assert!(matches!(err, SessionError::Decode(_)));
        assert!((scheduler.next_start_time() - 0.5).abs() < 1e-9);
        assert_eq!(log.borrow().started.len(), 1);
    }

    #[test]
    fn test_one_and_a_half_seconds_of_audio() {
        let (context, _log) = FakeContext::new();
        let mut scheduler = PlaybackScheduler::new(Box::new(context));

        let first = scheduler.enqueue(&silence(1.0), OUTPUT_SAMPLE_RATE, 1).unwrap();
        let second = scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();

        assert_eq!(first.start, 0.0);
        assert!((second.start - 1.0).abs() < 1e-9);
        assert!((scheduler.next_start_time() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_reap_finished_releases_played_sources() {
        let (context, log) = FakeContext::new();
        let mut scheduler = PlaybackScheduler::new(Box::new(context));
        let first = scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();
        scheduler.enqueue(&silence(0.5), OUTPUT_SAMPLE_RATE, 1).unwrap();

        log.borrow_mut().finished.push(first.id);

        assert_eq!(scheduler.reap_finished(), 1);
        assert_eq!(scheduler.active_count(), 1);
    }
}
