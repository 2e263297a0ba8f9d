//! Monitoring loop.
//!
//! Pulls frames one at a time and runs every detected face through
//! extraction, resolution, vitals and dispatch. Faces are independent: a
//! failure on one is logged and counted, and the loop moves on.
//!
//! In the default mode each frame's dispatches finish before the next frame
//! is read. With background dispatch, the decision and the per-identity gate
//! are still taken on the loop, but the send runs on the blocking pool while
//! the loop reads the next frame.

use crate::models::{DispatchOutcome, FaceObservation, FaceRegion, Frame, NotDispatchedReason};
use crate::services::{AlertDispatcher, IdentityResolver, classify};
use crate::sources::{FaceDetector, FeatureExtractor, FrameSource, VitalsSource};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Target frame rate; 0 processes frames as fast as they arrive.
    pub fps: u32,
    /// Consecutive frame-source errors tolerated before the loop stops.
    pub max_consecutive_frame_errors: u32,
    /// Run sends off the loop.
    pub background_dispatch: bool,
    /// How long to wait for in-flight sends when stopping.
    pub shutdown_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fps: 0,
            max_consecutive_frame_errors: 30,
            background_dispatch: false,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl MonitorConfig {
    /// Time allotted to one frame, or `None` when unpaced.
    #[must_use]
    pub fn frame_budget(&self) -> Option<Duration> {
        (self.fps > 0).then(|| Duration::from_nanos(1_000_000_000 / u64::from(self.fps)))
    }
}

/// Cloneable stop flag shared with a signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the loop to stop after the current frame.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`trigger`](Self::trigger) has been called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The frame source was exhausted.
    #[default]
    EndOfStream,
    /// The shutdown signal was triggered.
    Signal,
    /// Too many consecutive frame-source errors.
    FrameErrors,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// Frames read successfully.
    pub frames: u64,
    /// Face regions detected.
    pub faces: u64,
    /// Faces resolved to an identity.
    pub identified: u64,
    /// Faces not resolved.
    pub unknown: u64,
    /// Faces whose encoding could not be extracted.
    pub extraction_failures: u64,
    /// Faces with no vitals reading.
    pub vitals_unavailable: u64,
    /// Readings classified critical.
    pub critical: u64,
    /// Alerts sent.
    pub dispatched: u64,
    /// Alerts suppressed by cooldown.
    pub suppressed: u64,
    /// Alerts the transport failed to deliver.
    pub transport_errors: u64,
    /// Critical identified faces with no contact.
    pub no_contact: u64,
    /// Frame-source and detector errors.
    pub frame_errors: u64,
    /// Frames that overran the frame budget.
    pub deadline_misses: u64,
    /// In-flight sends abandoned at shutdown.
    pub abandoned: u64,
    /// Why the loop ended.
    pub stop_reason: StopReason,
}

impl LoopStats {
    fn tally(&mut self, outcome: &DispatchOutcome) {
        match outcome.reason() {
            None => self.dispatched += 1,
            Some(NotDispatchedReason::Suppressed) => self.suppressed += 1,
            Some(NotDispatchedReason::TransportError) => self.transport_errors += 1,
            Some(NotDispatchedReason::NoContact) => self.no_contact += 1,
            Some(NotDispatchedReason::NoIdentity | NotDispatchedReason::VitalsNormal) => {},
        }
    }
}

impl fmt::Display for LoopStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames:              {}", self.frames)?;
        writeln!(
            f,
            "faces:               {} ({} identified, {} unknown)",
            self.faces, self.identified, self.unknown
        )?;
        writeln!(f, "extraction failures: {}", self.extraction_failures)?;
        writeln!(f, "vitals unavailable:  {}", self.vitals_unavailable)?;
        writeln!(f, "critical readings:   {}", self.critical)?;
        writeln!(
            f,
            "alerts:              {} sent, {} suppressed, {} failed, {} without contact",
            self.dispatched, self.suppressed, self.transport_errors, self.no_contact
        )?;
        writeln!(f, "frame errors:        {}", self.frame_errors)?;
        writeln!(f, "deadline misses:     {}", self.deadline_misses)?;
        writeln!(f, "abandoned alerts:    {}", self.abandoned)?;
        write!(f, "stopped by:          {:?}", self.stop_reason)
    }
}

/// Drives the pipeline over a frame source.
pub struct MonitoringLoop {
    frames: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    extractor: Box<dyn FeatureExtractor>,
    vitals: Box<dyn VitalsSource>,
    resolver: IdentityResolver,
    dispatcher: Arc<AlertDispatcher>,
    config: MonitorConfig,
    in_flight: JoinSet<DispatchOutcome>,
    stats: LoopStats,
}

impl MonitoringLoop {
    /// Creates a loop over the given collaborators.
    #[must_use]
    pub fn new(
        frames: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        extractor: Box<dyn FeatureExtractor>,
        vitals: Box<dyn VitalsSource>,
        resolver: IdentityResolver,
        dispatcher: Arc<AlertDispatcher>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            frames,
            detector,
            extractor,
            vitals,
            resolver,
            dispatcher,
            config,
            in_flight: JoinSet::new(),
            stats: LoopStats::default(),
        }
    }

    /// Runs until end of stream, `stop`, or too many frame errors.
    ///
    /// In-flight background sends get up to `shutdown_grace` to finish; any
    /// still running are abandoned with a warning and counted.
    pub async fn run(mut self, stop: &ShutdownSignal) -> LoopStats {
        let budget = self.config.frame_budget();
        let mut consecutive_errors = 0u32;

        tracing::info!(
            fps = self.config.fps,
            background_dispatch = self.config.background_dispatch,
            transport = self.dispatcher.transport_name(),
            "monitoring started"
        );

        loop {
            if stop.is_triggered() {
                self.stats.stop_reason = StopReason::Signal;
                break;
            }

            let started = Instant::now();
            match self.frames.next_frame() {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    self.process_frame(&frame).await;
                },
                Ok(None) => {
                    self.stats.stop_reason = StopReason::EndOfStream;
                    break;
                },
                Err(e) => {
                    consecutive_errors += 1;
                    self.stats.frame_errors += 1;
                    metrics::counter!("vitalwatch_frame_errors_total").increment(1);
                    tracing::warn!(error = %e, consecutive = consecutive_errors, "frame error");
                    if consecutive_errors > self.config.max_consecutive_frame_errors {
                        tracing::error!(
                            consecutive = consecutive_errors,
                            "too many consecutive frame errors, stopping"
                        );
                        self.stats.stop_reason = StopReason::FrameErrors;
                        break;
                    }
                },
            }

            self.reap_finished();

            if let Some(budget) = budget {
                let elapsed = started.elapsed();
                if elapsed > budget {
                    self.stats.deadline_misses += 1;
                    metrics::counter!("vitalwatch_deadline_misses_total").increment(1);
                } else {
                    tokio::time::sleep(budget - elapsed).await;
                }
            }
        }

        self.drain().await;
        tracing::info!(
            frames = self.stats.frames,
            dispatched = self.stats.dispatched,
            stop_reason = ?self.stats.stop_reason,
            "monitoring stopped"
        );
        self.stats
    }

    async fn process_frame(&mut self, frame: &Frame) {
        self.stats.frames += 1;
        metrics::counter!("vitalwatch_frames_total").increment(1);

        let regions = match self.detector.detect(frame) {
            Ok(regions) => regions,
            Err(e) => {
                self.stats.frame_errors += 1;
                tracing::warn!(frame = frame.index, error = %e, "face detection failed");
                return;
            },
        };

        for region in &regions {
            self.process_face(frame, region).await;
        }
    }

    async fn process_face(&mut self, frame: &Frame, region: &FaceRegion) {
        self.stats.faces += 1;
        metrics::counter!("vitalwatch_faces_total").increment(1);

        let observation = match self.extractor.extract(frame, region) {
            Ok(encoding) => Some(FaceObservation::new(encoding, frame.captured_at)),
            Err(e) => {
                self.stats.extraction_failures += 1;
                tracing::warn!(
                    frame = frame.index,
                    region = region.id,
                    error = %e,
                    "feature extraction failed, treating face as unknown"
                );
                None
            },
        };

        let resolution = self.resolver.resolve(observation.as_ref());
        if resolution.is_unknown() {
            self.stats.unknown += 1;
        } else {
            self.stats.identified += 1;
        }

        let reading = match self.vitals.read(region, frame) {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.vitals_unavailable += 1;
                tracing::warn!(
                    frame = frame.index,
                    region = region.id,
                    identity = resolution.display_name(),
                    error = %e,
                    "vitals unavailable, skipping dispatch evaluation"
                );
                return;
            },
        };

        if classify(&reading).is_critical() {
            self.stats.critical += 1;
        }

        tracing::debug!(
            frame = frame.index,
            region = region.id,
            identity = resolution.display_name(),
            heart_rate = reading.heart_rate,
            breathing_rate = reading.breathing_rate,
            "face evaluated"
        );

        let now = frame.captured_at;
        if self.config.background_dispatch {
            match self.dispatcher.prepare(&resolution, &reading, now).await {
                Ok(pending) => {
                    self.in_flight.spawn_blocking(move || pending.deliver());
                },
                Err(reason) => self
                    .stats
                    .tally(&DispatchOutcome::NotDispatched(reason)),
            }
        } else {
            let outcome = self.dispatcher.evaluate(&resolution, &reading, now).await;
            self.stats.tally(&outcome);
        }
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            self.record_joined(joined);
        }
    }

    fn record_joined(&mut self, joined: Result<DispatchOutcome, tokio::task::JoinError>) {
        match joined {
            Ok(outcome) => self.stats.tally(&outcome),
            Err(e) => {
                tracing::error!(error = %e, "background dispatch task failed");
                self.stats.transport_errors += 1;
            },
        }
    }

    async fn drain(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }

        tracing::info!(
            in_flight = self.in_flight.len(),
            grace_secs = self.config.shutdown_grace.as_secs(),
            "waiting for in-flight alerts"
        );

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        while !self.in_flight.is_empty() {
            match tokio::time::timeout_at(deadline, self.in_flight.join_next()).await {
                Ok(Some(joined)) => self.record_joined(joined),
                Ok(None) | Err(_) => break,
            }
        }

        let abandoned = self.in_flight.len();
        if abandoned > 0 {
            tracing::warn!(abandoned, "shutdown grace elapsed, abandoning in-flight alerts");
            self.stats.abandoned = u64::try_from(abandoned).unwrap_or(u64::MAX);
            // Blocking sends cannot be cancelled; detaching lets them finish on their own.
            self.in_flight.detach_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_signal_is_shared() {
        let signal = ShutdownSignal::new();
        let handler_copy = signal.clone();
        assert!(!signal.is_triggered());
        handler_copy.trigger();
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_frame_budget() {
        let budget = |fps| MonitorConfig { fps, ..MonitorConfig::default() }.frame_budget();
        assert_eq!(budget(0), None);
        assert_eq!(budget(1), Some(Duration::from_secs(1)));
        assert_eq!(budget(3), Some(Duration::from_nanos(333_333_333)));
        assert_eq!(budget(2000), Some(Duration::from_micros(500)));
    }

    #[test]
    fn test_tally() {
        let mut stats = LoopStats::default();
        stats.tally(&DispatchOutcome::NotDispatched(NotDispatchedReason::Suppressed));
        stats.tally(&DispatchOutcome::NotDispatched(NotDispatchedReason::NoContact));
        stats.tally(&DispatchOutcome::NotDispatched(NotDispatchedReason::VitalsNormal));
        stats.tally(&DispatchOutcome::NotDispatched(NotDispatchedReason::TransportError));
        assert_eq!(stats.suppressed, 1);
        assert_eq!(stats.no_contact, 1);
        assert_eq!(stats.transport_errors, 1);
        assert_eq!(stats.dispatched, 0);
        assert!(stats.to_string().contains("0 sent, 1 suppressed, 1 failed, 1 without contact"));
    }
}
