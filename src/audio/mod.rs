//! Exclusive-ownership audio playback arbitration.
//!
//! A [`PlaybackManager`] owns one [`AudioSink`] and guarantees that at
//! most one clip is active at any instant: starting a new clip tears the
//! previous one down first, and an in-flight load is cancelled by any
//! newer request (supersession). Playback is suppressed while the page
//! is hidden. The manager is an explicitly constructed resource owner:
//! one instance per application scope, passed by reference to whatever
//! needs playback.

pub mod sink;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::telemetry::events::record_playback_failure;

pub use sink::{AudioSink, NullSink, SinkError};

/// Playback lifecycle of the single arbitrated output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        }
    }
}

/// Why a playback attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("clip failed to become playable within {0:?}")]
    LoadTimeout(Duration),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// One playable audio payload.
///
/// The API delivers synthesized speech inline as base64; the decoded
/// bytes are shared cheaply between the stores and the sink.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Bytes,
}

impl AudioClip {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SinkError> {
        BASE64_STANDARD
            .decode(encoded.trim())
            .map(|raw| Self {
                data: Bytes::from(raw),
            })
            .map_err(|err| SinkError::Decode(err.to_string()))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

type StateHook = Box<dyn Fn(PlaybackState) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&PlaybackError) + Send + Sync>;

#[derive(Debug, Default)]
struct PlaybackInner {
    state: PlaybackState,
    current_clip_id: Option<String>,
}

/// Arbiter of the single audio output.
pub struct PlaybackManager {
    sink: Arc<dyn AudioSink>,
    config: PlaybackConfig,
    inner: Mutex<PlaybackInner>,
    /// Bumped by every ownership change; an await-side check against the
    /// captured value detects supersession.
    generation: AtomicU64,
    page_visible: AtomicBool,
    clip_seq: AtomicU64,
    state_hooks: Mutex<Vec<StateHook>>,
    error_hooks: Mutex<Vec<ErrorHook>>,
}

impl PlaybackManager {
    pub fn new(sink: Arc<dyn AudioSink>, config: PlaybackConfig) -> Self {
        Self {
            sink,
            config,
            inner: Mutex::new(PlaybackInner::default()),
            generation: AtomicU64::new(0),
            page_visible: AtomicBool::new(true),
            clip_seq: AtomicU64::new(0),
            state_hooks: Mutex::new(Vec::new()),
            error_hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.lock_inner().state
    }

    pub fn current_clip_id(&self) -> Option<String> {
        self.lock_inner().current_clip_id.clone()
    }

    pub fn is_page_visible(&self) -> bool {
        self.page_visible.load(Ordering::SeqCst)
    }

    /// Registers a hook fired synchronously with every state transition.
    pub fn on_state_change<F>(&self, hook: F)
    where
        F: Fn(PlaybackState) + Send + Sync + 'static,
    {
        self.state_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Registers a hook fired synchronously when playback fails.
    pub fn on_error<F>(&self, hook: F)
    where
        F: Fn(&PlaybackError) + Send + Sync + 'static,
    {
        self.error_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Starts the clip, tearing down whatever currently owns the output.
    ///
    /// Resolves to whether playback actually started: a hidden page, a
    /// superseding call, or a load failure all resolve `false`. Failures
    /// reach the error hooks; the caller decides whether to retry.
    pub async fn play(&self, clip: AudioClip, clip_id: Option<String>) -> bool {
        if !self.page_visible.load(Ordering::SeqCst) {
            debug!(target: "playback_manager", "play refused while page hidden");
            return false;
        }

        let clip_id = clip_id.unwrap_or_else(|| self.next_clip_id());

        {
            let inner = self.lock_inner();
            if inner.current_clip_id.as_deref() == Some(clip_id.as_str())
                && matches!(inner.state, PlaybackState::Loading | PlaybackState::Playing)
            {
                // Duplicate request for the active clip is a no-op success.
                return true;
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Exclusivity: the previous clip is fully torn down before the
        // new clip enters Loading.
        if let Err(err) = self.sink.stop().await {
            warn!(target: "playback_manager", %err, "sink teardown before load failed");
        }
        self.apply(generation, PlaybackState::Idle, None);
        if !self.apply(generation, PlaybackState::Loading, Some(clip_id.clone())) {
            return false;
        }

        match timeout(self.config.load_timeout, self.sink.load(&clip)).await {
            Err(_) => {
                self.report_failure(
                    &clip_id,
                    PlaybackError::LoadTimeout(self.config.load_timeout),
                    generation,
                )
                .await;
                false
            }
            Ok(Err(err)) => {
                self.report_failure(&clip_id, PlaybackError::Sink(err), generation)
                    .await;
                false
            }
            Ok(Ok(())) => {
                if self.generation.load(Ordering::SeqCst) != generation {
                    // A newer play() owns the sink; vanish quietly.
                    debug!(
                        target: "playback_manager",
                        clip_id = %clip_id,
                        "load superseded before start"
                    );
                    return false;
                }
                if !self.page_visible.load(Ordering::SeqCst) {
                    self.teardown(generation).await;
                    return false;
                }
                match self.sink.start().await {
                    Ok(()) => self.apply(generation, PlaybackState::Playing, Some(clip_id)),
                    Err(err) => {
                        self.report_failure(&clip_id, PlaybackError::Sink(err), generation)
                            .await;
                        false
                    }
                }
            }
        }
    }

    /// Tears down the active clip and returns to `Idle`. Cancels any
    /// in-flight load. Safe to call at any time.
    pub async fn stop(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Err(err) = self.sink.stop().await {
            warn!(target: "playback_manager", %err, "sink stop failed");
        }
        self.apply(generation, PlaybackState::Idle, None);
    }

    /// Pauses output; no-op unless currently `Playing`.
    pub async fn pause(&self) {
        let (clip_id, generation) = {
            let inner = self.lock_inner();
            if inner.state != PlaybackState::Playing {
                return;
            }
            (
                inner.current_clip_id.clone(),
                self.generation.load(Ordering::SeqCst),
            )
        };

        match self.sink.pause().await {
            Ok(()) => {
                self.apply(generation, PlaybackState::Paused, clip_id);
            }
            Err(err) => {
                let clip_id = clip_id.unwrap_or_default();
                self.report_failure(&clip_id, PlaybackError::Sink(err), generation)
                    .await;
            }
        }
    }

    /// Resumes paused output; no-op unless currently `Paused`. Falls
    /// back to a full stop when the page is no longer visible.
    pub async fn resume(&self) {
        let (clip_id, generation) = {
            let inner = self.lock_inner();
            if inner.state != PlaybackState::Paused {
                return;
            }
            (
                inner.current_clip_id.clone(),
                self.generation.load(Ordering::SeqCst),
            )
        };

        if !self.page_visible.load(Ordering::SeqCst) {
            self.stop().await;
            return;
        }

        match self.sink.resume().await {
            Ok(()) => {
                self.apply(generation, PlaybackState::Playing, clip_id);
            }
            Err(err) => {
                let clip_id = clip_id.unwrap_or_default();
                self.report_failure(&clip_id, PlaybackError::Sink(err), generation)
                    .await;
            }
        }
    }

    /// Mirrors document visibility. Hiding the page force-stops any
    /// active clip; a stop, not a pause.
    pub async fn set_page_visible(&self, visible: bool) {
        self.page_visible.store(visible, Ordering::SeqCst);
        if !visible && self.config.stop_when_hidden && self.state() != PlaybackState::Idle {
            info!(target: "playback_manager", "page hidden; stopping playback");
            self.stop().await;
        }
    }

    fn next_clip_id(&self) -> String {
        let seq = self.clip_seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("clip-{seq}")
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, PlaybackInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies the transition if `generation` still owns the output.
    /// Returns whether it was applied; hooks fire only on actual change.
    fn apply(&self, generation: u64, state: PlaybackState, clip_id: Option<String>) -> bool {
        let changed = {
            let mut inner = self.lock_inner();
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            let changed = inner.state != state || inner.current_clip_id != clip_id;
            inner.state = state;
            inner.current_clip_id = clip_id;
            changed
        };

        if changed {
            self.notify_state(state);
        }
        true
    }

    async fn teardown(&self, generation: u64) {
        if let Err(err) = self.sink.stop().await {
            warn!(target: "playback_manager", %err, "sink teardown failed");
        }
        self.apply(generation, PlaybackState::Idle, None);
    }

    async fn report_failure(&self, clip_id: &str, error: PlaybackError, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            // The attempt was already superseded; its failure is moot.
            debug!(
                target: "playback_manager",
                clip_id = %clip_id,
                "suppressing failure from superseded attempt"
            );
            return;
        }
        record_playback_failure(clip_id, error.to_string());
        self.notify_error(&error);
        self.teardown(generation).await;
    }

    fn notify_state(&self, state: PlaybackState) {
        let hooks = self
            .state_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook(state);
        }
    }

    fn notify_error(&self, error: &PlaybackError) {
        let hooks = self
            .error_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::time::{sleep, Duration};

    struct LoadPlan {
        delay: Duration,
        result: Result<(), SinkError>,
    }

    impl LoadPlan {
        fn ok() -> Self {
            Self {
                delay: Duration::ZERO,
                result: Ok(()),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self { delay, result: Ok(()) }
        }

        fn failing(error: SinkError) -> Self {
            Self {
                delay: Duration::ZERO,
                result: Err(error),
            }
        }
    }

    #[derive(Default)]
    struct ScriptedSink {
        ops: StdMutex<Vec<&'static str>>,
        load_plans: StdMutex<VecDeque<LoadPlan>>,
    }

    impl ScriptedSink {
        fn with_plans(plans: Vec<LoadPlan>) -> Self {
            Self {
                ops: StdMutex::new(Vec::new()),
                load_plans: StdMutex::new(plans.into()),
            }
        }

        fn record(&self, op: &'static str) {
            self.ops.lock().expect("ops lock poisoned").push(op);
        }

        fn ops(&self) -> Vec<&'static str> {
            self.ops.lock().expect("ops lock poisoned").clone()
        }

        fn load_count(&self) -> usize {
            self.ops().iter().filter(|op| **op == "load").count()
        }
    }

    #[async_trait::async_trait]
    impl AudioSink for ScriptedSink {
        async fn load(&self, _clip: &AudioClip) -> Result<(), SinkError> {
            self.record("load");
            let plan = self
                .load_plans
                .lock()
                .expect("plans lock poisoned")
                .pop_front()
                .unwrap_or_else(LoadPlan::ok);
            if !plan.delay.is_zero() {
                sleep(plan.delay).await;
            }
            plan.result
        }

        async fn start(&self) -> Result<(), SinkError> {
            self.record("start");
            Ok(())
        }

        async fn pause(&self) -> Result<(), SinkError> {
            self.record("pause");
            Ok(())
        }

        async fn resume(&self) -> Result<(), SinkError> {
            self.record("resume");
            Ok(())
        }

        async fn stop(&self) -> Result<(), SinkError> {
            self.record("stop");
            Ok(())
        }
    }

    fn clip() -> AudioClip {
        AudioClip::new(Bytes::from_static(b"pcm"))
    }

    fn manager_with(
        sink: Arc<ScriptedSink>,
        config: PlaybackConfig,
    ) -> (Arc<PlaybackManager>, Arc<StdMutex<Vec<PlaybackState>>>) {
        let manager = Arc::new(PlaybackManager::new(sink, config));
        let states = Arc::new(StdMutex::new(Vec::new()));
        let recorder = Arc::clone(&states);
        manager.on_state_change(move |state| {
            recorder.lock().expect("states lock poisoned").push(state);
        });
        (manager, states)
    }

    #[tokio::test]
    async fn play_starts_clip_and_walks_loading_to_playing() {
        let sink = Arc::new(ScriptedSink::default());
        let (manager, states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());

        let started = manager.play(clip(), Some("clip-a".into())).await;

        assert!(started);
        assert_eq!(manager.state(), PlaybackState::Playing);
        assert_eq!(manager.current_clip_id().as_deref(), Some("clip-a"));
        assert_eq!(
            states.lock().expect("states").clone(),
            vec![PlaybackState::Loading, PlaybackState::Playing]
        );
        assert_eq!(sink.ops(), vec!["stop", "load", "start"]);
    }

    #[tokio::test]
    async fn play_refused_while_page_hidden() {
        let sink = Arc::new(ScriptedSink::default());
        let (manager, states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());
        manager.set_page_visible(false).await;

        let started = manager.play(clip(), Some("clip-a".into())).await;

        assert!(!started);
        assert_eq!(manager.state(), PlaybackState::Idle);
        assert!(states.lock().expect("states").is_empty());
        assert!(sink.ops().is_empty());
    }

    #[tokio::test]
    async fn newest_play_wins_with_teardown_before_load() {
        let sink = Arc::new(ScriptedSink::default());
        let (manager, states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());

        assert!(manager.play(clip(), Some("clip-a".into())).await);
        assert!(manager.play(clip(), Some("clip-b".into())).await);

        assert_eq!(manager.state(), PlaybackState::Playing);
        assert_eq!(manager.current_clip_id().as_deref(), Some("clip-b"));
        // The second clip's teardown (stop, Idle) is observed before its
        // Loading state is entered.
        assert_eq!(
            states.lock().expect("states").clone(),
            vec![
                PlaybackState::Loading,
                PlaybackState::Playing,
                PlaybackState::Idle,
                PlaybackState::Loading,
                PlaybackState::Playing,
            ]
        );
        assert_eq!(
            sink.ops(),
            vec!["stop", "load", "start", "stop", "load", "start"]
        );
    }

    #[tokio::test]
    async fn duplicate_play_for_loading_clip_is_noop() {
        let sink = Arc::new(ScriptedSink::with_plans(vec![LoadPlan::slow(
            Duration::from_millis(100),
        )]));
        let (manager, _states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.play(clip(), Some("clip-a".into())).await })
        };
        sleep(Duration::from_millis(20)).await;

        // The first request is still loading; a duplicate resolves true
        // without re-issuing a load.
        let second = manager.play(clip(), Some("clip-a".into())).await;
        assert!(second);

        assert!(first.await.expect("first play task"));
        assert_eq!(sink.load_count(), 1);
        assert_eq!(manager.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn superseded_load_resolves_not_started() {
        let sink = Arc::new(ScriptedSink::with_plans(vec![
            LoadPlan::slow(Duration::from_millis(150)),
            LoadPlan::ok(),
        ]));
        let (manager, _states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());
        let errors: Arc<StdMutex<Vec<PlaybackError>>> = Arc::new(StdMutex::new(Vec::new()));
        let recorder = Arc::clone(&errors);
        manager.on_error(move |error| {
            recorder.lock().expect("errors").push(error.clone());
        });

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.play(clip(), Some("clip-a".into())).await })
        };
        sleep(Duration::from_millis(20)).await;

        assert!(manager.play(clip(), Some("clip-b".into())).await);

        // The slow load finishes after ownership moved on; it reports
        // not-started without disturbing the new clip.
        assert!(!first.await.expect("first play task"));
        assert_eq!(manager.state(), PlaybackState::Playing);
        assert_eq!(manager.current_clip_id().as_deref(), Some("clip-b"));
        assert!(errors.lock().expect("errors").is_empty());
    }

    #[tokio::test]
    async fn load_timeout_reports_error_and_lands_idle() {
        let sink = Arc::new(ScriptedSink::with_plans(vec![LoadPlan::slow(
            Duration::from_millis(200),
        )]));
        let config = PlaybackConfig {
            load_timeout: Duration::from_millis(50),
            ..PlaybackConfig::default()
        };
        let (manager, _states) = manager_with(Arc::clone(&sink), config);
        let errors: Arc<StdMutex<Vec<PlaybackError>>> = Arc::new(StdMutex::new(Vec::new()));
        let recorder = Arc::clone(&errors);
        manager.on_error(move |error| {
            recorder.lock().expect("errors").push(error.clone());
        });

        let started = manager.play(clip(), Some("clip-a".into())).await;

        assert!(!started);
        assert_eq!(manager.state(), PlaybackState::Idle);
        assert_eq!(
            errors.lock().expect("errors").clone(),
            vec![PlaybackError::LoadTimeout(Duration::from_millis(50))]
        );
    }

    #[tokio::test]
    async fn sink_load_failure_reports_error_and_lands_idle() {
        let sink = Arc::new(ScriptedSink::with_plans(vec![LoadPlan::failing(
            SinkError::Decode("bad frame header".into()),
        )]));
        let (manager, _states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());
        let errors: Arc<StdMutex<Vec<PlaybackError>>> = Arc::new(StdMutex::new(Vec::new()));
        let recorder = Arc::clone(&errors);
        manager.on_error(move |error| {
            recorder.lock().expect("errors").push(error.clone());
        });

        let started = manager.play(clip(), Some("clip-a".into())).await;

        assert!(!started);
        assert_eq!(manager.state(), PlaybackState::Idle);
        assert_eq!(manager.current_clip_id(), None);
        assert_eq!(
            errors.lock().expect("errors").clone(),
            vec![PlaybackError::Sink(SinkError::Decode(
                "bad frame header".into()
            ))]
        );
    }

    #[tokio::test]
    async fn pause_and_resume_are_guarded() {
        let sink = Arc::new(ScriptedSink::default());
        let (manager, _states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());

        // Outside Playing, pause is a no-op.
        manager.pause().await;
        assert_eq!(manager.state(), PlaybackState::Idle);

        assert!(manager.play(clip(), Some("clip-a".into())).await);
        manager.pause().await;
        assert_eq!(manager.state(), PlaybackState::Paused);

        // Outside Paused, resume is a no-op.
        manager.pause().await;
        assert_eq!(manager.state(), PlaybackState::Paused);

        manager.resume().await;
        assert_eq!(manager.state(), PlaybackState::Playing);
        assert_eq!(manager.current_clip_id().as_deref(), Some("clip-a"));
    }

    #[tokio::test]
    async fn resume_on_hidden_page_falls_back_to_stop() {
        let sink = Arc::new(ScriptedSink::default());
        let config = PlaybackConfig {
            stop_when_hidden: false,
            ..PlaybackConfig::default()
        };
        let (manager, _states) = manager_with(Arc::clone(&sink), config);

        assert!(manager.play(clip(), Some("clip-a".into())).await);
        manager.pause().await;
        manager.set_page_visible(false).await;

        manager.resume().await;

        assert_eq!(manager.state(), PlaybackState::Idle);
        assert_eq!(manager.current_clip_id(), None);
    }

    #[tokio::test]
    async fn hiding_the_page_stops_playback() {
        let sink = Arc::new(ScriptedSink::default());
        let (manager, _states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());

        assert!(manager.play(clip(), Some("clip-a".into())).await);
        manager.set_page_visible(false).await;

        assert_eq!(manager.state(), PlaybackState::Idle);
        assert_eq!(sink.ops().last(), Some(&"stop"));
    }

    #[tokio::test]
    async fn stop_is_idempotent_from_idle() {
        let sink = Arc::new(ScriptedSink::default());
        let (manager, states) = manager_with(Arc::clone(&sink), PlaybackConfig::default());

        manager.stop().await;
        manager.stop().await;

        assert_eq!(manager.state(), PlaybackState::Idle);
        assert!(states.lock().expect("states").is_empty());
    }

    #[test]
    fn clip_decodes_inline_base64() {
        let clip = AudioClip::from_base64("aGVsbG8=").expect("valid payload");
        assert_eq!(clip.data.as_ref(), b"hello");
        assert!(!clip.is_empty());

        let err = AudioClip::from_base64("not base64!!").expect_err("invalid payload");
        assert!(matches!(err, SinkError::Decode(_)));
    }
}
