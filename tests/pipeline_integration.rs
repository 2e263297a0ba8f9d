//! End-to-end tests of resolution, classification and alert dispatch.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Duration as TimeDelta, TimeZone, Utc};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use vitalwatch::models::{DispatchOutcome, NotDispatchedReason};
use vitalwatch::services::{
    AlertDispatcher, CooldownTracker, IdentityGallery, IdentityResolver, MonitorConfig,
    MonitoringLoop, ResolverConfig, ShutdownSignal, StopReason,
};
use vitalwatch::sources::Replay;
use vitalwatch::storage::InMemoryIdentityStore;
use vitalwatch::transport::RecordingTransport;
use vitalwatch::{EnrolledIdentity, FaceObservation, VitalReading};

const DIMENSIONS: usize = 4;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn gallery(entries: &[(&str, [f64; DIMENSIONS], Option<&str>)]) -> Arc<IdentityGallery> {
    let gallery =
        IdentityGallery::load(Box::new(InMemoryIdentityStore::new()), DIMENSIONS).unwrap();
    for (name, encoding, contact) in entries {
        gallery
            .enroll(EnrolledIdentity::new(
                *name,
                encoding.to_vec(),
                contact.map(str::to_string),
            ))
            .unwrap();
    }
    Arc::new(gallery)
}

fn family() -> Arc<IdentityGallery> {
    gallery(&[
        ("Alice", [0.0, 1.0, 0.0, 0.0], Some("+15550100")),
        ("Bob", [1.0, 0.0, 0.0, 0.0], Some("+15550101")),
        ("Carol", [0.0, 0.0, 1.0, 0.0], None),
    ])
}

fn pipeline(
    gallery: &Arc<IdentityGallery>,
) -> (IdentityResolver, AlertDispatcher, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    let resolver = IdentityResolver::new(Arc::clone(gallery), ResolverConfig::default());
    let dispatcher = AlertDispatcher::new(
        Arc::clone(&transport) as _,
        CooldownTracker::new(Duration::from_secs(60)),
    );
    (resolver, dispatcher, transport)
}

fn observe(encoding: [f64; DIMENSIONS], at: DateTime<Utc>) -> FaceObservation {
    FaceObservation::new(encoding.to_vec(), at)
}

#[tokio::test]
async fn test_critical_identified_face_alerts_contact() {
    let gallery = family();
    let (resolver, dispatcher, transport) = pipeline(&gallery);

    let resolution = resolver.resolve(Some(&observe([1.0, 0.0, 0.0, 0.0], t0())));
    assert_eq!(resolution.display_name(), "Bob");

    let outcome = dispatcher
        .evaluate(&resolution, &VitalReading::new(110, 16, t0()), t0())
        .await;
    assert!(outcome.is_dispatched());

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].contact, "+15550101");
    let body = sent[0].message.body();
    assert!(body.contains("Bob is in critical condition"));
    assert!(body.contains("Heart Rate: 110 BPM"));
    assert!(body.contains("Breathing Rate: 16 BPM"));
    assert_eq!(dispatcher.cooldown().last_dispatch("Bob"), Some(t0()));
}

#[tokio::test]
async fn test_cooldown_suppresses_then_allows() {
    let gallery = family();
    let (resolver, dispatcher, transport) = pipeline(&gallery);
    let reading = VitalReading::new(45, 16, t0());

    let mut outcomes = Vec::new();
    for offset in [0, 10, 59, 60, 70] {
        let now = t0() + TimeDelta::seconds(offset);
        let resolution = resolver.resolve(Some(&observe([0.0, 1.0, 0.0, 0.0], now)));
        outcomes.push(dispatcher.evaluate(&resolution, &reading, now).await.reason());
    }

    assert_eq!(
        outcomes,
        vec![
            None,
            Some(NotDispatchedReason::Suppressed),
            Some(NotDispatchedReason::Suppressed),
            None,
            Some(NotDispatchedReason::Suppressed),
        ]
    );
    assert_eq!(transport.send_count(), 2);
}

#[tokio::test]
async fn test_cooldown_is_per_identity() {
    let gallery = family();
    let (resolver, dispatcher, transport) = pipeline(&gallery);
    let reading = VitalReading::new(130, 30, t0());

    for encoding in [[0.0, 1.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]] {
        let resolution = resolver.resolve(Some(&observe(encoding, t0())));
        assert!(dispatcher.evaluate(&resolution, &reading, t0()).await.is_dispatched());
    }
    assert_eq!(transport.send_count(), 2);
}

#[tokio::test]
async fn test_transport_failure_does_not_start_cooldown() {
    let gallery = family();
    let (resolver, dispatcher, transport) = pipeline(&gallery);
    let resolution = resolver.resolve(Some(&observe([1.0, 0.0, 0.0, 0.0], t0())));
    let reading = VitalReading::new(110, 16, t0());

    transport.fail_next("HTTP 503 response after 4 attempt(s)");
    let outcome = dispatcher.evaluate(&resolution, &reading, t0()).await;
    assert_eq!(outcome.reason(), Some(NotDispatchedReason::TransportError));
    assert_eq!(dispatcher.cooldown().last_dispatch("Bob"), None);

    let later = t0() + TimeDelta::seconds(1);
    let outcome = dispatcher.evaluate(&resolution, &reading, later).await;
    assert!(outcome.is_dispatched());
    assert_eq!(transport.send_count(), 2);
}

#[tokio::test]
async fn test_unknown_face_never_alerts() {
    let gallery = family();
    let (resolver, dispatcher, transport) = pipeline(&gallery);
    let critical = VitalReading::new(30, 40, t0());

    let stranger = resolver.resolve(Some(&observe([5.0, 5.0, 5.0, 5.0], t0())));
    assert!(stranger.is_unknown());
    let failed_extraction = resolver.resolve(None);

    for resolution in [stranger, failed_extraction] {
        let outcome = dispatcher.evaluate(&resolution, &critical, t0()).await;
        assert_eq!(outcome.reason(), Some(NotDispatchedReason::NoIdentity));
    }
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_normal_vitals_and_missing_contact() {
    let gallery = family();
    let (resolver, dispatcher, transport) = pipeline(&gallery);

    let bob = resolver.resolve(Some(&observe([1.0, 0.0, 0.0, 0.0], t0())));
    let outcome = dispatcher
        .evaluate(&bob, &VitalReading::new(72, 14, t0()), t0())
        .await;
    assert_eq!(outcome.reason(), Some(NotDispatchedReason::VitalsNormal));

    let carol = resolver.resolve(Some(&observe([0.0, 0.0, 1.0, 0.0], t0())));
    assert_eq!(carol.display_name(), "Carol");
    let outcome = dispatcher
        .evaluate(&carol, &VitalReading::new(150, 16, t0()), t0())
        .await;
    assert_eq!(outcome.reason(), Some(NotDispatchedReason::NoContact));

    assert_eq!(transport.send_count(), 0);
    assert_eq!(dispatcher.cooldown().tracked(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_evaluations_send_once() {
    let gallery = family();
    let transport = Arc::new(RecordingTransport::new().with_delay(Duration::from_millis(50)));
    let resolver = IdentityResolver::new(Arc::clone(&gallery), ResolverConfig::default());
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::clone(&transport) as _,
        CooldownTracker::new(Duration::from_secs(60)),
    ));
    let resolution = resolver.resolve(Some(&observe([1.0, 0.0, 0.0, 0.0], t0())));
    let reading = VitalReading::new(110, 16, t0());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            let resolution = resolution.clone();
            tokio::spawn(async move { dispatcher.evaluate(&resolution, &reading, t0()).await })
        })
        .collect();

    let mut dispatched = 0;
    for task in tasks {
        if task.await.unwrap().is_dispatched() {
            dispatched += 1;
        }
    }
    assert_eq!(dispatched, 1);
    assert_eq!(transport.send_count(), 1);
}

const RECORDING: &str = r#"{"timestamp":"2024-05-01T12:00:00Z","width":640,"height":480,"faces":[{"region":{"x":10,"y":10,"width":96,"height":96},"encoding":[1.0,0.0,0.0,0.0],"vitals":{"heart_rate":110,"breathing_rate":16}},{"region":{"x":300,"y":10,"width":96,"height":96},"encoding":[0.0,1.0,0.0,0.0],"vitals":{"heart_rate":72,"breathing_rate":14}}]}
{"timestamp":"2024-05-01T12:00:01Z","width":640,"height":480,"faces":[{"region":{"x":12,"y":10,"width":96,"height":96},"encoding":[1.0,0.0,0.0,0.0],"vitals":{"heart_rate":112,"breathing_rate":17}},{"region":{"x":500,"y":200,"width":80,"height":80},"encoding":[5.0,5.0,5.0,5.0],"vitals":{"heart_rate":140,"breathing_rate":30}}]}
this line is not a frame
{"timestamp":"2024-05-01T12:01:05Z","width":640,"height":480,"faces":[{"region":{"x":14,"y":10,"width":96,"height":96},"encoding":null,"vitals":{"heart_rate":115,"breathing_rate":16}},{"region":{"x":16,"y":10,"width":96,"height":96},"encoding":[1.0,0.0,0.0,0.0],"vitals":null},{"region":{"x":18,"y":10,"width":96,"height":96},"encoding":[1.0,0.0,0.0,0.0],"vitals":{"heart_rate":115,"breathing_rate":16}}]}
"#;

async fn run_recording(background_dispatch: bool) -> (vitalwatch::services::LoopStats, Arc<RecordingTransport>) {
    let gallery = family();
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::clone(&transport) as _,
        CooldownTracker::new(Duration::from_secs(60)),
    ));
    let replay = Replay::from_reader(Cursor::new(RECORDING.as_bytes().to_vec()));
    let config = MonitorConfig {
        background_dispatch,
        ..MonitorConfig::default()
    };

    let stats = MonitoringLoop::new(
        Box::new(replay.frames),
        Box::new(replay.detector),
        Box::new(replay.extractor),
        Box::new(replay.vitals),
        IdentityResolver::new(gallery, ResolverConfig::default()),
        dispatcher,
        config,
    )
    .run(&ShutdownSignal::new())
    .await;
    (stats, transport)
}

fn assert_recording_stats(stats: &vitalwatch::services::LoopStats, transport: &RecordingTransport) {
    assert_eq!(stats.stop_reason, StopReason::EndOfStream);
    assert_eq!(stats.frames, 3);
    assert_eq!(stats.frame_errors, 1);
    assert_eq!(stats.faces, 7);
    assert_eq!(stats.identified, 5);
    assert_eq!(stats.unknown, 2);
    assert_eq!(stats.extraction_failures, 1);
    assert_eq!(stats.vitals_unavailable, 1);
    assert_eq!(stats.critical, 5);
    // 12:00:00 sends, 12:00:01 is inside the cooldown, 12:01:05 is past it.
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.suppressed, 1);
    assert_eq!(stats.abandoned, 0);

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|s| s.contact == "+15550101"));
}

#[tokio::test]
async fn test_replayed_session_inline_dispatch() {
    let (stats, transport) = run_recording(false).await;
    assert_recording_stats(&stats, &transport);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replayed_session_background_dispatch() {
    let (stats, transport) = run_recording(true).await;
    assert_recording_stats(&stats, &transport);
}

#[tokio::test]
async fn test_signal_before_start_stops_immediately() {
    let replay = Replay::from_reader(Cursor::new(RECORDING.as_bytes().to_vec()));
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::clone(&transport) as _,
        CooldownTracker::default(),
    ));
    let stop = ShutdownSignal::new();
    stop.trigger();

    let stats = MonitoringLoop::new(
        Box::new(replay.frames),
        Box::new(replay.detector),
        Box::new(replay.extractor),
        Box::new(replay.vitals),
        IdentityResolver::new(family(), ResolverConfig::default()),
        dispatcher,
        MonitorConfig::default(),
    )
    .run(&stop)
    .await;

    assert_eq!(stats.stop_reason, StopReason::Signal);
    assert_eq!(stats.frames, 0);
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_send_is_abandoned_after_grace() {
    let one_frame = RECORDING.lines().next().unwrap().to_string();
    let replay = Replay::from_reader(Cursor::new(one_frame.into_bytes()));
    let transport = Arc::new(RecordingTransport::new().with_delay(Duration::from_millis(500)));
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::clone(&transport) as _,
        CooldownTracker::default(),
    ));
    let config = MonitorConfig {
        background_dispatch: true,
        shutdown_grace: Duration::ZERO,
        ..MonitorConfig::default()
    };

    let stats = MonitoringLoop::new(
        Box::new(replay.frames),
        Box::new(replay.detector),
        Box::new(replay.extractor),
        Box::new(replay.vitals),
        IdentityResolver::new(family(), ResolverConfig::default()),
        dispatcher,
        config,
    )
    .run(&ShutdownSignal::new())
    .await;

    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.dispatched, 0);
}

#[test]
fn test_dispatch_outcome_labels() {
    let outcome = DispatchOutcome::NotDispatched(NotDispatchedReason::Suppressed);
    assert_eq!(outcome.label(), "suppressed");
    assert!(!outcome.is_dispatched());
}
