//! The presence view model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use edupulse_common::{ErrorCategory, PresenceError, PresenceSnapshot};

use crate::auth::CredentialStore;
use crate::fetch::SnapshotSource;
use crate::stream::{PresenceStream, StreamEvent};

use super::types::{Granularity, ViewError, ViewState};

/// Tuning knobs for the view model.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Snapshot form requested on first load.
    pub initial_granularity: Granularity,
    /// Grace period before an unauthorized response clears the stored
    /// credential, so the consumer can show the re-auth prompt first.
    pub auth_invalidate_delay: Duration,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            initial_granularity: Granularity::Summary,
            auth_invalidate_delay: Duration::from_secs(3),
        }
    }
}

/// Single source of truth for the presence widget.
///
/// Owns the merged view of push and pull updates. Constructed explicitly
/// by the composition root and handed to whichever consumer needs it;
/// teardown is explicit too, nothing here relies on process lifetime.
pub struct PresenceViewModel {
    source: Arc<dyn SnapshotSource>,
    stream: PresenceStream,
    credentials: Arc<dyn CredentialStore>,
    config: ViewConfig,
    state: Arc<RwLock<ViewState>>,
    updates: broadcast::Sender<ViewState>,
    closed: Arc<AtomicBool>,
    translator: StdMutex<Option<JoinHandle<()>>>,
}

impl PresenceViewModel {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        stream: PresenceStream,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self::with_config(source, stream, credentials, ViewConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn SnapshotSource>,
        stream: PresenceStream,
        credentials: Arc<dyn CredentialStore>,
        config: ViewConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(64);
        let state = ViewState {
            granularity: config.initial_granularity,
            ..ViewState::default()
        };
        Self {
            source,
            stream,
            credentials,
            config,
            state: Arc::new(RwLock::new(state)),
            updates,
            closed: Arc::new(AtomicBool::new(false)),
            translator: StdMutex::new(None),
        }
    }

    /// Subscribe to view updates. Every change publishes the full state.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewState> {
        self.updates.subscribe()
    }

    /// Current state, for consumers that poll instead of subscribing.
    pub async fn current(&self) -> ViewState {
        self.state.read().await.clone()
    }

    /// Kick off the initial fetch and the streaming connection.
    ///
    /// The connect is fire-and-forget; the REST fetch gives the consumer
    /// something to show while the handshake is in flight. Once the
    /// stream is up, push updates supersede this fetch.
    pub async fn initialize(&self) {
        self.spawn_translator();
        self.stream.connect().await;
        let granularity = self.state.read().await.granularity;
        self.fetch_and_apply(granularity).await;
    }

    /// Re-request the current snapshot: over the stream when connected,
    /// over REST otherwise.
    pub async fn refresh(&self) {
        let granularity = self.state.read().await.granularity;
        if self.stream.is_connected().await {
            match granularity {
                Granularity::Summary => self.stream.request_summary_refresh().await,
                Granularity::Details => self.stream.request_details_refresh().await,
            }
        } else {
            self.fetch_and_apply(granularity).await;
        }
    }

    /// Switch between summary and detailed granularity.
    ///
    /// Enabling triggers a details refresh through whichever transport is
    /// live. Disabling only flips the granularity: the held snapshot and
    /// the connection survive.
    pub async fn set_detail_mode(&self, enabled: bool) {
        let granularity = if enabled {
            Granularity::Details
        } else {
            Granularity::Summary
        };
        {
            let mut st = self.state.write().await;
            if st.granularity == granularity {
                return;
            }
            st.granularity = granularity;
            let _ = self.updates.send(st.clone());
        }
        if enabled {
            if self.stream.is_connected().await {
                self.stream.request_details_refresh().await;
            } else {
                self.fetch_and_apply(Granularity::Details).await;
            }
        }
    }

    /// Disconnect the stream and stop applying updates. Results of any
    /// still-in-flight fetch are discarded on arrival.
    pub async fn teardown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.stream.disconnect().await;
        let handle = self
            .translator
            .lock()
            .expect("translator lock poisoned")
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    async fn fetch_and_apply(&self, granularity: Granularity) {
        let result = match granularity {
            Granularity::Summary => self.source.fetch_summary().await,
            Granularity::Details => self.source.fetch_details().await,
        };
        if self.closed.load(Ordering::SeqCst) {
            debug!("dropping fetch result after teardown");
            return;
        }
        match result {
            Ok(outcome) => {
                apply_snapshot(
                    &self.state,
                    &self.updates,
                    outcome.snapshot,
                    outcome.failed_attempts,
                )
                .await;
            }
            Err(err) => self.apply_error(err).await,
        }
    }

    async fn apply_error(&self, err: PresenceError) {
        warn!(error = %err, "presence fetch failed");

        if err.category() == ErrorCategory::Auth {
            // The whole session is invalid; clear the credential once the
            // consumer has had a moment to show the re-auth prompt.
            let credentials = Arc::clone(&self.credentials);
            let delay = self.config.auth_invalidate_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                credentials.invalidate();
            });
        }

        let mut st = self.state.write().await;
        if matches!(err, PresenceError::Unreachable { .. }) && st.snapshot.is_none() {
            // First load with nothing to show: degrade to an empty
            // snapshot rather than a blank widget.
            st.snapshot = Some(PresenceSnapshot::fallback(
                st.granularity == Granularity::Details,
            ));
        }
        st.retry_count = err.retries();
        st.last_error = Some(ViewError::from(&err));
        let _ = self.updates.send(st.clone());
    }

    fn spawn_translator(&self) {
        let mut guard = self.translator.lock().expect("translator lock poisoned");
        if guard.is_some() {
            return;
        }

        let mut events = self.stream.subscribe();
        let state = Arc::clone(&self.state);
        let updates = self.updates.clone();
        let stream = self.stream.clone();

        *guard = Some(tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "presence event stream lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                match event {
                    StreamEvent::Connected => {
                        set_connected(&state, &updates, true).await;
                        // Ask for an immediate re-emit so the view does
                        // not wait for the next server-side change.
                        let granularity = state.read().await.granularity;
                        match granularity {
                            Granularity::Summary => stream.request_summary_refresh().await,
                            Granularity::Details => stream.request_details_refresh().await,
                        }
                    }
                    StreamEvent::Disconnected => {
                        set_connected(&state, &updates, false).await;
                    }
                    StreamEvent::SummarySnapshot(snapshot) => {
                        apply_snapshot(&state, &updates, snapshot, 0).await;
                    }
                    StreamEvent::DetailsSnapshot(snapshot) => {
                        apply_snapshot(&state, &updates, snapshot, 0).await;
                    }
                }
            }
        }));
    }
}

/// Fold a snapshot into the view, last-observed-wins.
///
/// A summary arriving while details are held only moves the count and
/// timestamp forward; the held entries stay until a detailed snapshot
/// replaces them. Any applied snapshot clears the error state.
async fn apply_snapshot(
    state: &RwLock<ViewState>,
    updates: &broadcast::Sender<ViewState>,
    snapshot: PresenceSnapshot,
    failed_attempts: u32,
) {
    let mut st = state.write().await;
    if snapshot.is_detailed() {
        st.snapshot = Some(snapshot);
    } else {
        match st.snapshot.as_mut() {
            Some(current) if current.is_detailed() => current.apply_summary(&snapshot),
            _ => st.snapshot = Some(snapshot),
        }
    }
    st.last_error = None;
    st.retry_count = failed_attempts;
    st.last_refreshed = Some(Utc::now());
    let _ = updates.send(st.clone());
}

async fn set_connected(
    state: &RwLock<ViewState>,
    updates: &broadcast::Sender<ViewState>,
    connected: bool,
) {
    let mut st = state.write().await;
    st.connected = connected;
    let _ = updates.send(st.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio::sync::Notify;

    use edupulse_common::{PresenceEntry, Result, Role};

    use crate::auth::StaticCredentials;
    use crate::fetch::FetchOutcome;
    use crate::stream::{ConnectionEvent, ConnectionState, StreamCommand};

    // -----------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------

    struct FakeSource {
        summary_calls: AtomicU32,
        details_calls: AtomicU32,
        summary: StdMutex<VecDeque<Result<FetchOutcome>>>,
        details: StdMutex<VecDeque<Result<FetchOutcome>>>,
        gate: StdMutex<Option<Arc<Notify>>>,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                summary_calls: AtomicU32::new(0),
                details_calls: AtomicU32::new(0),
                summary: StdMutex::new(VecDeque::new()),
                details: StdMutex::new(VecDeque::new()),
                gate: StdMutex::new(None),
            })
        }

        fn push_summary(&self, result: Result<FetchOutcome>) {
            self.summary.lock().unwrap().push_back(result);
        }

        fn push_details(&self, result: Result<FetchOutcome>) {
            self.details.lock().unwrap().push_back(result);
        }

        fn gate_on(&self, notify: Arc<Notify>) {
            *self.gate.lock().unwrap() = Some(notify);
        }

        fn summary_count(&self) -> u32 {
            self.summary_calls.load(Ordering::SeqCst)
        }

        fn details_count(&self) -> u32 {
            self.details_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotSource for FakeSource {
        async fn fetch_summary(&self) -> Result<FetchOutcome> {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.summary
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(summary_outcome(0, 0)))
        }

        async fn fetch_details(&self) -> Result<FetchOutcome> {
            self.details_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.details
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(details_outcome(&[])))
        }
    }

    fn summary_outcome(total: u32, failed_attempts: u32) -> FetchOutcome {
        FetchOutcome {
            snapshot: PresenceSnapshot::summary(total, Utc::now()),
            failed_attempts,
        }
    }

    fn details_snapshot(ids: &[&str]) -> PresenceSnapshot {
        let now = Utc::now();
        PresenceSnapshot {
            total_online: ids.len() as u32,
            as_of: now,
            details: Some(
                ids.iter()
                    .map(|id| PresenceEntry {
                        subject_id: id.to_string(),
                        display_name: format!("user-{id}"),
                        role: Role::Standard,
                        connected_at: now,
                        last_activity_at: now,
                    })
                    .collect(),
            ),
        }
    }

    fn details_outcome(ids: &[&str]) -> FetchOutcome {
        FetchOutcome {
            snapshot: details_snapshot(ids),
            failed_attempts: 0,
        }
    }

    struct Harness {
        model: Arc<PresenceViewModel>,
        source: Arc<FakeSource>,
        credentials: Arc<StaticCredentials>,
        commands: mpsc::Receiver<StreamCommand>,
        stream_events: broadcast::Sender<StreamEvent>,
        stream_state: Arc<RwLock<ConnectionState>>,
    }

    fn harness() -> Harness {
        harness_with_config(ViewConfig {
            auth_invalidate_delay: Duration::ZERO,
            ..ViewConfig::default()
        })
    }

    fn harness_with_config(config: ViewConfig) -> Harness {
        let (command_tx, commands) = mpsc::channel(16);
        let (stream_events, _) = broadcast::channel(64);
        let stream_state = Arc::new(RwLock::new(ConnectionState::new()));
        let stream = PresenceStream::from_parts(
            command_tx,
            stream_events.clone(),
            Arc::clone(&stream_state),
        );
        let source = FakeSource::new();
        let credentials = Arc::new(StaticCredentials::new("token"));
        let model = Arc::new(PresenceViewModel::with_config(
            Arc::clone(&source) as Arc<dyn SnapshotSource>,
            stream,
            Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            config,
        ));
        Harness {
            model,
            source,
            credentials,
            commands,
            stream_events,
            stream_state,
        }
    }

    impl Harness {
        async fn mark_stream_connected(&self) {
            self.stream_state
                .write()
                .await
                .apply(ConnectionEvent::HandshakeSucceeded);
        }
    }

    async fn await_state(
        rx: &mut broadcast::Receiver<ViewState>,
        pred: impl Fn(&ViewState) -> bool,
    ) -> ViewState {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Ok(st) if pred(&st) => return st,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        panic!("view updates channel closed")
                    }
                }
            }
        })
        .await
        .expect("timed out waiting for view state")
    }

    // -----------------------------------------------------------------
    // Scenarios
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn cold_start_fetch_then_push_supersedes() {
        let mut h = harness();
        h.source.push_summary(Ok(summary_outcome(3, 0)));
        let mut updates = h.model.subscribe();

        h.model.initialize().await;

        // Connect command went out to the stream task.
        assert!(matches!(h.commands.recv().await, Some(StreamCommand::Connect)));

        // The fetch populated the view for immediate display.
        let st = h.model.current().await;
        assert_eq!(st.snapshot.as_ref().unwrap().total_online, 3);
        assert!(st.last_error.is_none());

        // Stream comes up and pushes a newer count.
        h.mark_stream_connected().await;
        h.stream_events.send(StreamEvent::Connected).unwrap();
        h.stream_events
            .send(StreamEvent::SummarySnapshot(PresenceSnapshot::summary(
                4,
                Utc::now(),
            )))
            .unwrap();

        let st = await_state(&mut updates, |st| {
            st.snapshot.as_ref().is_some_and(|s| s.total_online == 4)
        })
        .await;
        assert!(st.connected);
        // No flicker into an error state along the way.
        assert!(st.last_error.is_none());
    }

    #[tokio::test]
    async fn connected_event_requests_reemit_for_current_granularity() {
        let mut h = harness();
        h.model.initialize().await;
        assert!(matches!(h.commands.recv().await, Some(StreamCommand::Connect)));

        h.mark_stream_connected().await;
        h.stream_events.send(StreamEvent::Connected).unwrap();

        assert!(matches!(
            h.commands.recv().await,
            Some(StreamCommand::RequestSummaryRefresh)
        ));
    }

    #[tokio::test]
    async fn refresh_uses_rest_while_disconnected() {
        let mut h = harness();
        h.model.refresh().await;

        assert_eq!(h.source.summary_count(), 1);
        assert!(h.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresh_uses_stream_once_connected() {
        let mut h = harness();
        h.mark_stream_connected().await;

        h.model.refresh().await;

        assert!(matches!(
            h.commands.recv().await,
            Some(StreamCommand::RequestSummaryRefresh)
        ));
        assert_eq!(h.source.summary_count(), 0);
    }

    #[tokio::test]
    async fn double_refresh_applies_only_last_received_snapshot() {
        let mut h = harness();
        h.model.spawn_translator();
        h.mark_stream_connected().await;
        let mut updates = h.model.subscribe();

        h.model.refresh().await;
        h.model.refresh().await;
        assert!(matches!(
            h.commands.recv().await,
            Some(StreamCommand::RequestSummaryRefresh)
        ));
        assert!(matches!(
            h.commands.recv().await,
            Some(StreamCommand::RequestSummaryRefresh)
        ));

        h.stream_events
            .send(StreamEvent::SummarySnapshot(PresenceSnapshot::summary(
                5,
                Utc::now(),
            )))
            .unwrap();
        h.stream_events
            .send(StreamEvent::SummarySnapshot(PresenceSnapshot::summary(
                6,
                Utc::now(),
            )))
            .unwrap();

        let st = await_state(&mut updates, |st| {
            st.snapshot.as_ref().is_some_and(|s| s.total_online == 6)
        })
        .await;
        assert_eq!(st.snapshot.unwrap().total_online, 6);
    }

    #[tokio::test]
    async fn unauthorized_surfaces_auth_error_and_invalidates_credentials() {
        let h = harness();
        h.source
            .push_summary(Err(PresenceError::Unauthorized("session expired".into())));

        h.model.initialize().await;

        let st = h.model.current().await;
        let err = st.last_error.unwrap();
        assert_eq!(err.category, ErrorCategory::Auth);
        assert_eq!(st.retry_count, 0);

        // The spawned invalidation task clears the credential.
        tokio::time::timeout(Duration::from_secs(2), async {
            while h.credentials.bearer_token().is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("credential was never invalidated");
    }

    #[tokio::test]
    async fn flap_success_reports_failed_attempts_without_error() {
        let h = harness();
        h.source.push_summary(Ok(summary_outcome(2, 2)));

        h.model.initialize().await;

        let st = h.model.current().await;
        assert_eq!(st.snapshot.unwrap().total_online, 2);
        assert_eq!(st.retry_count, 2);
        assert!(st.last_error.is_none());
    }

    #[tokio::test]
    async fn unreachable_first_load_installs_fallback_snapshot() {
        let h = harness();
        h.source.push_summary(Err(PresenceError::Unreachable {
            message: "connection refused".into(),
            retries: 2,
        }));

        h.model.initialize().await;

        let st = h.model.current().await;
        let snapshot = st.snapshot.unwrap();
        assert_eq!(snapshot.total_online, 0);
        let err = st.last_error.unwrap();
        assert_eq!(err.category, ErrorCategory::Network);
        assert_eq!(err.severity, edupulse_common::Severity::Warning);
        assert_eq!(st.retry_count, 2);
    }

    #[tokio::test]
    async fn fetch_error_keeps_last_known_good_snapshot() {
        let h = harness();
        h.source.push_summary(Ok(summary_outcome(7, 0)));
        h.model.initialize().await;
        assert_eq!(h.model.current().await.snapshot.as_ref().unwrap().total_online, 7);

        h.source.push_summary(Err(PresenceError::Server {
            message: "boom".into(),
            retries: 2,
        }));
        h.model.refresh().await;

        let st = h.model.current().await;
        assert_eq!(st.snapshot.unwrap().total_online, 7);
        let err = st.last_error.unwrap();
        assert_eq!(err.category, ErrorCategory::Server);
        assert_eq!(err.retries, 2);
    }

    #[tokio::test]
    async fn detail_toggle_while_connected_goes_over_stream() {
        let mut h = harness();
        h.model.spawn_translator();
        h.mark_stream_connected().await;
        let mut updates = h.model.subscribe();

        h.model.set_detail_mode(true).await;

        assert!(matches!(
            h.commands.recv().await,
            Some(StreamCommand::RequestDetailsRefresh)
        ));
        assert_eq!(h.source.details_count(), 0);

        h.stream_events
            .send(StreamEvent::DetailsSnapshot(details_snapshot(&["u1", "u2"])))
            .unwrap();

        let st = await_state(&mut updates, |st| {
            st.snapshot.as_ref().is_some_and(PresenceSnapshot::is_detailed)
        })
        .await;
        assert_eq!(st.granularity, Granularity::Details);
        let snapshot = st.snapshot.unwrap();
        assert_eq!(snapshot.total_online, 2);
        assert_eq!(snapshot.details.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn detail_toggle_while_disconnected_falls_back_to_rest() {
        let h = harness();
        h.source.push_details(Ok(details_outcome(&["u1"])));

        h.model.set_detail_mode(true).await;

        assert_eq!(h.source.details_count(), 1);
        let st = h.model.current().await;
        assert!(st.snapshot.unwrap().is_detailed());
    }

    #[tokio::test]
    async fn disabling_detail_mode_keeps_snapshot_and_connection() {
        let h = harness();
        h.source.push_details(Ok(details_outcome(&["u1"])));
        h.model.set_detail_mode(true).await;
        h.mark_stream_connected().await;

        h.model.set_detail_mode(false).await;

        let st = h.model.current().await;
        assert_eq!(st.granularity, Granularity::Summary);
        // Held entries survive a granularity flip.
        assert!(st.snapshot.unwrap().is_detailed());
        assert!(h.model.stream.is_connected().await);
    }

    #[tokio::test]
    async fn summary_push_preserves_held_details() {
        let h = harness();
        h.model.spawn_translator();
        h.source.push_details(Ok(details_outcome(&["u1", "u2", "u3"])));
        h.model.set_detail_mode(true).await;
        let mut updates = h.model.subscribe();

        h.stream_events
            .send(StreamEvent::SummarySnapshot(PresenceSnapshot::summary(
                9,
                Utc::now(),
            )))
            .unwrap();

        let st = await_state(&mut updates, |st| {
            st.snapshot.as_ref().is_some_and(|s| s.total_online == 9)
        })
        .await;
        let snapshot = st.snapshot.unwrap();
        assert_eq!(snapshot.details.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stream_drop_flips_flag_but_keeps_snapshot() {
        let h = harness();
        h.model.spawn_translator();
        h.source.push_summary(Ok(summary_outcome(5, 0)));
        h.model.initialize().await;
        let mut updates = h.model.subscribe();

        h.stream_events.send(StreamEvent::Connected).unwrap();
        await_state(&mut updates, |st| st.connected).await;

        h.stream_events.send(StreamEvent::Disconnected).unwrap();
        let st = await_state(&mut updates, |st| !st.connected).await;
        assert_eq!(st.snapshot.unwrap().total_online, 5);
        assert!(st.last_error.is_none());
    }

    #[tokio::test]
    async fn teardown_discards_in_flight_fetch_results() {
        let mut h = harness();
        let gate = Arc::new(Notify::new());
        h.source.gate_on(Arc::clone(&gate));
        h.source.push_summary(Ok(summary_outcome(8, 0)));

        let model = Arc::clone(&h.model);
        let fetch = tokio::spawn(async move { model.refresh().await });
        // Let the fetch reach the gate before tearing down.
        tokio::time::timeout(Duration::from_secs(2), async {
            while h.source.summary_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("fetch never started");

        h.model.teardown().await;
        assert!(matches!(
            h.commands.recv().await,
            Some(StreamCommand::Disconnect)
        ));

        gate.notify_one();
        fetch.await.unwrap();

        // The late result was dropped, not applied.
        assert!(h.model.current().await.snapshot.is_none());
    }
}
