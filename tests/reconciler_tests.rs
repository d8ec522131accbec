// Reconciler session tests on paused time: stream preference, polling fallback, teardown

mod common;

use common::{FakeEngine, SAMPLE_JSON, stream_then_end, stream_then_silence};
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{Duration, sleep};
use vncp::models::{ContainerState, LiveStats, RawStats, SessionMode};
use vncp::reconciler::{ReconcilerConfig, ReconcilerSession, StatsBackend, StatsChunk};

const POLL_LINE: &str = "12.50%|10MiB / 1GiB";

fn start(engine: &Arc<FakeEngine>, state: ContainerState) -> ReconcilerSession {
    start_with(engine, state, ReconcilerConfig::default())
}

fn start_with(
    engine: &Arc<FakeEngine>,
    state: ContainerState,
    config: ReconcilerConfig,
) -> ReconcilerSession {
    let backend: Arc<dyn StatsBackend> = engine.clone();
    ReconcilerSession::start(backend, "abc123", state, config)
}

fn polling_engine() -> FakeEngine {
    FakeEngine {
        default_poll: Some(POLL_LINE.into()),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn silent_stream_falls_back_to_one_poll_then_recurring_polls() {
    let engine = Arc::new(polling_engine());
    let session = start(&engine, ContainerState::Running);
    let display = session.watch();
    assert_eq!(session.mode(), SessionMode::AwaitingFirstSample);

    sleep(Duration::from_millis(900)).await;
    assert_eq!(engine.polls(), 0);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(engine.polls(), 1, "exactly one poll right after the watchdog");
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Polling);
    assert_eq!(live.cpu_text, "12.50%");
    assert_eq!(live.memory_text, "10MiB / 1GiB");

    sleep(Duration::from_millis(2000)).await;
    assert_eq!(engine.polls(), 2, "poll timer keeps running");

    session.join().await;
    let after_stop = engine.polls();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(engine.polls(), after_stop, "no polls after teardown");
    assert_eq!(display.borrow().mode, SessionMode::Stopped);
}

#[tokio::test(start_paused = true)]
async fn early_sample_keeps_the_stream_and_never_polls() {
    let engine = Arc::new(
        polling_engine().with_stream(stream_then_silence(vec![StatsChunk::Text(
            SAMPLE_JSON.into(),
        )])),
    );
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(100)).await;
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::AwaitingFirstSample);
    assert_eq!(live.cpu_text, "100.00%");

    sleep(Duration::from_millis(1000)).await;
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Streaming);
    assert_eq!(live.cpu_text, "100.00%");
    assert_eq!(live.memory_text, "10.0 MiB / 100 MiB");

    sleep(Duration::from_secs(10)).await;
    assert_eq!(engine.polls(), 0);
    assert_eq!(engine.opens(), 1);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn newline_delimited_chunk_paints_the_last_sample() {
    let second = SAMPLE_JSON.replace("\"usage\":10485760", "\"usage\":20971520");
    let chunk = format!("{SAMPLE_JSON}\nnot json\n{second}\n");
    let engine =
        Arc::new(polling_engine().with_stream(stream_then_silence(vec![StatsChunk::Text(chunk)])));
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(1100)).await;
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Streaming);
    assert_eq!(live.memory_text, "20.0 MiB / 100 MiB");
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn unparseable_stream_output_still_falls_back() {
    let engine = Arc::new(polling_engine().with_stream(stream_then_silence(vec![
        StatsChunk::Text("garbage".into()),
        StatsChunk::Text(String::new()),
    ])));
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(1050)).await;
    assert_eq!(session.mode(), SessionMode::Polling);
    assert_eq!(engine.polls(), 1);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn failed_subscription_falls_back_after_the_watchdog() {
    let engine = Arc::new(FakeEngine {
        fail_open: true,
        ..polling_engine()
    });
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(session.mode(), SessionMode::AwaitingFirstSample);
    assert_eq!(engine.polls(), 0);

    sleep(Duration::from_millis(550)).await;
    assert_eq!(session.mode(), SessionMode::Polling);
    assert_eq!(engine.polls(), 1);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn stream_that_ends_without_samples_falls_back() {
    let engine = Arc::new(polling_engine().with_stream(stream::empty().boxed()));
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(1050)).await;
    assert_eq!(session.mode(), SessionMode::Polling);
    assert_eq!(engine.polls(), 1);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn failed_or_empty_poll_keeps_previous_values() {
    let engine = Arc::new(FakeEngine::default().with_poll_replies(vec![
        Ok("5.00%|1MiB / 2MiB"),
        Err("Error response from daemon: No such container"),
        Ok(""),
    ]));
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(1050)).await;
    assert_eq!(session.latest().cpu_text, "5.00%");

    sleep(Duration::from_millis(4000)).await;
    assert_eq!(engine.polls(), 3);
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Polling);
    assert_eq!(live.cpu_text, "5.00%");
    assert_eq!(live.memory_text, "1MiB / 2MiB");
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn open_that_never_resolves_still_falls_back_to_polling() {
    let engine = Arc::new(FakeEngine {
        hang_open: true,
        ..polling_engine()
    });
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(session.mode(), SessionMode::AwaitingFirstSample);
    assert_eq!(engine.opens(), 1);
    assert_eq!(engine.polls(), 0);

    sleep(Duration::from_millis(550)).await;
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Polling);
    assert_eq!(live.cpu_text, "12.50%");
    assert_eq!(engine.polls(), 1);

    sleep(Duration::from_secs(9)).await;
    assert_eq!(engine.polls(), 5);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn stream_ending_after_streaming_clears_values_and_polls() {
    let engine = Arc::new(FakeEngine::default().with_stream(stream_then_end(
        vec![StatsChunk::Text(SAMPLE_JSON.into())],
        Duration::from_millis(1500),
    )));
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(1100)).await;
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Streaming);
    assert_eq!(live.cpu_text, "100.00%");
    assert_eq!(engine.polls(), 0);

    // The container is gone, so the poll fails and the display stays cleared.
    sleep(Duration::from_millis(900)).await;
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Polling);
    assert_eq!(engine.polls(), 1);
    assert_eq!(live.cpu_display(), LiveStats::PLACEHOLDER);
    assert_eq!(live.memory_display(), LiveStats::PLACEHOLDER);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(engine.polls(), 2, "poll timer keeps running");
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn stream_ending_after_streaming_repaints_from_polls() {
    let engine = Arc::new(polling_engine().with_stream(stream_then_end(
        vec![StatsChunk::Text(SAMPLE_JSON.into())],
        Duration::from_millis(1500),
    )));
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(session.mode(), SessionMode::Streaming);

    sleep(Duration::from_millis(500)).await;
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Polling);
    assert_eq!(live.cpu_text, "12.50%");
    assert_eq!(live.memory_text, "10MiB / 1GiB");
    assert_eq!(engine.opens(), 1);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn payloads_without_metrics_do_not_count_as_samples() {
    let engine = Arc::new(polling_engine().with_stream(stream_then_silence(vec![
        StatsChunk::Text("[]".into()),
        StatsChunk::Text(r#"{"message":"No such container: abc123"}"#.into()),
        StatsChunk::Sample(RawStats::default()),
    ])));
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(session.latest().cpu_display(), LiveStats::PLACEHOLDER);

    sleep(Duration::from_millis(550)).await;
    let live = session.latest();
    assert_eq!(live.mode, SessionMode::Polling);
    assert_eq!(live.cpu_text, "12.50%");
    assert_eq!(engine.polls(), 1);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn stopped_container_is_idle_and_opens_nothing() {
    let engine = Arc::new(polling_engine());
    let mut session = start(&engine, ContainerState::Exited);
    assert_eq!(session.mode(), SessionMode::Idle);
    assert!(session.is_finished());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(engine.opens(), 0);
    assert_eq!(engine.polls(), 0);
    let live = session.latest();
    assert_eq!(live.cpu_display(), LiveStats::PLACEHOLDER);
    assert_eq!(live.memory_display(), LiveStats::PLACEHOLDER);

    session.stop();
    session.stop();
    assert_eq!(session.mode(), SessionMode::Stopped);
}

#[tokio::test(start_paused = true)]
async fn empty_container_id_is_idle() {
    let engine = Arc::new(polling_engine());
    let backend: Arc<dyn StatsBackend> = engine.clone();
    let session = ReconcilerSession::start(
        backend,
        "",
        ContainerState::Running,
        ReconcilerConfig::default(),
    );
    assert_eq!(session.mode(), SessionMode::Idle);
    session.join().await;
    assert_eq!(engine.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_before_watchdog_prevents_any_poll() {
    let engine = Arc::new(polling_engine());
    let mut session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(500)).await;
    session.stop();
    session.stop();
    assert_eq!(session.mode(), SessionMode::Stopped);

    sleep(Duration::from_secs(5)).await;
    assert!(session.is_finished());
    assert_eq!(engine.polls(), 0);
    assert_eq!(session.mode(), SessionMode::Stopped);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_stops_polling() {
    let engine = Arc::new(polling_engine());
    let session = start(&engine, ContainerState::Running);

    sleep(Duration::from_millis(1050)).await;
    assert_eq!(engine.polls(), 1);
    drop(session);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(engine.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_a_poll_waiting_for_the_limiter() {
    let engine = Arc::new(polling_engine());
    let config = ReconcilerConfig {
        poll_limiter: Some(Arc::new(Semaphore::new(0))),
        ..Default::default()
    };
    let session = start_with(&engine, ContainerState::Running, config);

    sleep(Duration::from_millis(1050)).await;
    assert_eq!(session.mode(), SessionMode::Polling);
    assert_eq!(engine.polls(), 0, "no permit, no poll");

    session.join().await;
    assert_eq!(engine.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn custom_timings_are_honoured() {
    let engine = Arc::new(polling_engine());
    let config = ReconcilerConfig {
        watchdog: Duration::from_millis(200),
        poll_interval: Duration::from_millis(500),
        poll_limiter: None,
    };
    let session = start_with(&engine, ContainerState::Running, config);

    sleep(Duration::from_millis(250)).await;
    assert_eq!(engine.polls(), 1);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(engine.polls(), 3);
    session.join().await;
}

#[tokio::test(start_paused = true)]
async fn watchers_see_every_mode_change() {
    let engine = Arc::new(polling_engine());
    let session = start(&engine, ContainerState::Running);
    let mut display = session.watch();
    assert_eq!(
        display.borrow_and_update().mode,
        SessionMode::AwaitingFirstSample
    );

    display.changed().await.unwrap();
    assert_eq!(display.borrow_and_update().mode, SessionMode::Polling);
    session.join().await;
}
