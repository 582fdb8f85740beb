//! Hand-written test doubles for the collaborator traits.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use crate::error::{ItemError, SessionError, StreamError};
use crate::events::{BroadcastEvent, EventEmitter, PlaybackEvent, SessionEvent};
use crate::media::{
    AudioCodec, MediaItem, MediaObserver, MediaResolver, MediaStream, MetadataProvider,
    ProbeInfo, Resource, SearchHit, SearchProvider, SourceKind, StreamSource, TrackMetadata,
};
use crate::player::{AudioOutput, PlayerEventSink};
use crate::voice::{
    ConnectionState, JoinRequest, SessionKey, StateReporter, VoiceConnection, VoiceGateway,
    VoiceLink,
};

/// Lets every runnable task make progress. With paused time, also fires any
/// timer due within the next millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn mp3_probe() -> ProbeInfo {
    ProbeInfo {
        codec: AudioCodec::Mp3,
        content_length: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Media
// ─────────────────────────────────────────────────────────────────────────────

/// Stream that yields nothing and counts kills.
pub struct FakeStream {
    fail_probe: bool,
    killed: Arc<AtomicUsize>,
    dead: bool,
}

impl FakeStream {
    pub fn new(fail_probe: bool, killed: Arc<AtomicUsize>) -> Self {
        Self {
            fail_probe,
            killed,
            dead: false,
        }
    }
}

#[async_trait]
impl MediaStream for FakeStream {
    async fn probe(&mut self) -> Result<ProbeInfo, StreamError> {
        if self.fail_probe {
            return Err(StreamError::UnsupportedContentType("text/html".into()));
        }
        Ok(mp3_probe())
    }

    async fn read_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        if self.dead {
            return Err(StreamError::Closed);
        }
        Ok(None)
    }

    fn kill(&mut self) {
        if !self.dead {
            self.dead = true;
            self.killed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Wraps an item in a ready-to-play resource.
pub fn resource_for(item: &Arc<MediaItem>) -> Resource {
    Resource::new(
        Arc::clone(item),
        mp3_probe(),
        Box::new(FakeStream::new(false, Arc::new(AtomicUsize::new(0)))),
    )
}

#[derive(Default)]
pub struct FakeStreamSource {
    fail_probe: bool,
    opened: AtomicUsize,
    killed: Arc<AtomicUsize>,
}

impl FakeStreamSource {
    pub fn failing_probe() -> Self {
        Self {
            fail_probe: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn killed(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamSource for FakeStreamSource {
    async fn open(
        &self,
        _url: &str,
        _kind: SourceKind,
    ) -> Result<Box<dyn MediaStream>, StreamError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream::new(
            self.fail_probe,
            Arc::clone(&self.killed),
        )))
    }
}

pub struct FakeSearch(Option<SearchHit>);

impl FakeSearch {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn hit(hit: SearchHit) -> Self {
        Self(Some(hit))
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, _query: &str) -> Result<Option<SearchHit>, StreamError> {
        Ok(self.0.clone())
    }
}

pub struct FakeMetadata(Option<TrackMetadata>);

impl FakeMetadata {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn with(metadata: TrackMetadata) -> Self {
        Self(Some(metadata))
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadata {
    async fn lookup(&self, _url: &str) -> Result<Option<TrackMetadata>, StreamError> {
        Ok(self.0.clone())
    }
}

/// Resolver that fails queries starting with "bad" and can hold resolutions
/// until the test releases them.
#[derive(Default)]
pub struct ScriptedResolver {
    gate: Option<Arc<Semaphore>>,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    /// Every resolution waits for a permit from [`Self::release`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Resolutions begun so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Resources killed without being played.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaResolver for ScriptedResolver {
    async fn resolve(&self, item: &Arc<MediaItem>) -> Result<Resource, ItemError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if item.query().starts_with("bad") {
            return Err(ItemError::ResolutionFailure(format!(
                "No results for '{}'",
                item.query()
            )));
        }
        Ok(Resource::new(
            Arc::clone(item),
            mp3_probe(),
            Box::new(FakeStream::new(false, Arc::clone(&self.released))),
        ))
    }
}

/// Observer that logs `start:`, `finish:` and `error:` entries by query.
#[derive(Default)]
pub struct RecordingObserver {
    entries: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    fn push(&self, kind: &str, item: &MediaItem) {
        self.entries.lock().push(format!("{}:{}", kind, item.query()));
    }
}

impl MediaObserver for RecordingObserver {
    fn on_start(&self, item: &MediaItem) {
        self.push("start", item);
    }

    fn on_finish(&self, item: &MediaItem) {
        self.push("finish", item);
    }

    fn on_error(&self, item: &MediaItem, _error: &ItemError) {
        self.push("error", item);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Player / Events
// ─────────────────────────────────────────────────────────────────────────────

/// Output that records commands; playback progress is driven by the test.
#[derive(Default)]
pub struct RecordingOutput {
    played: Mutex<Vec<String>>,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    stops: AtomicUsize,
}

impl RecordingOutput {
    /// Track ids handed to `play`, in order.
    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&self, resource: Resource) {
        self.played.lock().push(resource.item().id().to_string());
    }

    fn pause(&self) -> bool {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn resume(&self) -> bool {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<BroadcastEvent>>,
}

impl RecordingEmitter {
    pub fn all(&self) -> Vec<BroadcastEvent> {
        self.events.lock().clone()
    }

    pub fn playback_events(&self) -> Vec<PlaybackEvent> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                BroadcastEvent::Playback(event) => Some(event),
                BroadcastEvent::Session(_) => None,
            })
            .collect()
    }

    pub fn session_events(&self) -> Vec<SessionEvent> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                BroadcastEvent::Session(event) => Some(event),
                BroadcastEvent::Playback(_) => None,
            })
            .collect()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit_playback(&self, event: PlaybackEvent) {
        self.events.lock().push(event.into());
    }

    fn emit_session(&self, event: SessionEvent) {
        self.events.lock().push(event.into());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Voice
// ─────────────────────────────────────────────────────────────────────────────

/// Connection whose rejoins report `Signalling` (or fail, if told to).
pub struct FakeConnection {
    reporter: StateReporter,
    rejoins: AtomicU32,
    destroys: AtomicUsize,
    fail: AtomicBool,
    refuse: AtomicBool,
    rejoin_tx: mpsc::UnboundedSender<u32>,
}

impl FakeConnection {
    /// Returns the connection and a receiver yielding each rejoin's ordinal.
    pub fn new(reporter: StateReporter) -> (Arc<Self>, mpsc::UnboundedReceiver<u32>) {
        let (rejoin_tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            reporter,
            rejoins: AtomicU32::new(0),
            destroys: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            refuse: AtomicBool::new(false),
            rejoin_tx,
        });
        (connection, rx)
    }

    pub fn fail_rejoins(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes later rejoins fail with a fatal error.
    pub fn refuse_rejoins(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    pub fn rejoin_count(&self) -> u32 {
        self.rejoins.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn rejoin(&self) -> Result<(), SessionError> {
        let ordinal = self.rejoins.fetch_add(1, Ordering::SeqCst) + 1;
        let result = if self.refuse.load(Ordering::SeqCst) {
            Err(SessionError::SessionRemoved)
        } else if self.fail.load(Ordering::SeqCst) {
            Err(SessionError::RejoinFailed("voice server unavailable".into()))
        } else {
            self.reporter.report(ConnectionState::Signalling);
            Ok(())
        };
        let _ = self.rejoin_tx.send(ordinal);
        result
    }

    fn destroy(&self) {
        self.destroys.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a [`FakeGateway`] handed out for one join.
#[derive(Clone)]
pub struct JoinedSession {
    pub session_key: SessionKey,
    pub states: StateReporter,
    pub player_events: PlayerEventSink,
    pub connection: Arc<FakeConnection>,
    pub output: Arc<RecordingOutput>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum GatewayMode {
    /// Reports `Ready` during the join.
    Ready,
    /// Never reports anything.
    Silent,
    Refusing,
}

pub struct FakeGateway {
    mode: GatewayMode,
    joined: Mutex<Vec<JoinedSession>>,
}

impl FakeGateway {
    fn with_mode(mode: GatewayMode) -> Self {
        Self {
            mode,
            joined: Mutex::new(Vec::new()),
        }
    }

    pub fn ready() -> Self {
        Self::with_mode(GatewayMode::Ready)
    }

    pub fn silent() -> Self {
        Self::with_mode(GatewayMode::Silent)
    }

    pub fn refusing() -> Self {
        Self::with_mode(GatewayMode::Refusing)
    }

    pub fn joined(&self) -> Vec<JoinedSession> {
        self.joined.lock().clone()
    }

    /// The most recent join.
    ///
    /// # Panics
    ///
    /// Panics if nothing has joined yet.
    pub fn last(&self) -> JoinedSession {
        self.joined
            .lock()
            .last()
            .cloned()
            .expect("no session has joined")
    }

    pub fn join_count(&self) -> usize {
        self.joined.lock().len()
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(&self, request: JoinRequest) -> Result<VoiceLink, SessionError> {
        // Lets concurrent joins interleave like a real handshake would.
        tokio::task::yield_now().await;
        if self.mode == GatewayMode::Refusing {
            return Err(SessionError::JoinFailed("channel is full".into()));
        }

        let (connection, _rejoins) = FakeConnection::new(request.states.clone());
        let output = Arc::new(RecordingOutput::default());
        if self.mode == GatewayMode::Ready {
            request.states.report(ConnectionState::Ready);
        }

        self.joined.lock().push(JoinedSession {
            session_key: request.session_key,
            states: request.states,
            player_events: request.player_events,
            connection: Arc::clone(&connection),
            output: Arc::clone(&output),
        });

        Ok(VoiceLink { connection, output })
    }
}
