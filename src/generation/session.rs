use std::sync::Mutex as StdMutex;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::models::{
    GenerationEvent, PresentationSnapshot, PresentationStatus, ProjectId, SlideAudio, SlideContent,
    SlideNarration, SlideTheme, ThemeStage,
};

/// Capacity of each subscriber's queue.
pub const SUBSCRIBER_CAPACITY: usize = 256;

/// What a generation run was asked to produce.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub project_id: ProjectId,
    pub themes: Vec<SlideTheme>,
    pub language: String,
    pub access_token: Option<String>,
}

/// A live connection: the catch-up frame plus the queue of later events.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub catch_up: GenerationEvent,
    pub events: mpsc::Receiver<GenerationEvent>,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<GenerationEvent>,
}

struct SessionState {
    status: PresentationStatus,
    theme_states: Vec<ThemeStage>,
    slides: Vec<SlideContent>,
    narrations: Vec<SlideNarration>,
    audio_files: Vec<SlideAudio>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
}

impl SessionState {
    fn set_stage(&mut self, index: usize, stage: ThemeStage) {
        if let Some(slot) = self.theme_states.get_mut(index) {
            *slot = stage;
        }
    }

    fn fold(&mut self, event: &GenerationEvent) {
        match event {
            GenerationEvent::SlideGenerationStarted(started) => {
                self.set_stage(started.slide_index, ThemeStage::GeneratingContent);
            }
            GenerationEvent::SlideContent(slide) => {
                self.set_stage(slide.index, ThemeStage::GeneratingNarration);
                self.slides.push(slide.clone());
            }
            GenerationEvent::SlideNarration(narration) => {
                self.set_stage(narration.slide_index, ThemeStage::GeneratingAudio);
                self.narrations.push(narration.clone());
            }
            GenerationEvent::SlideAudio(audio) => {
                self.set_stage(audio.slide_index, ThemeStage::Completed);
                self.audio_files.push(audio.clone());
            }
            GenerationEvent::Error(failure) => {
                if let Some(index) = failure.slide_index {
                    self.set_stage(index, ThemeStage::Failed);
                }
            }
            GenerationEvent::PresentationComplete(_) => {
                self.status = PresentationStatus::Completed;
            }
            GenerationEvent::PresentationState(_) => {}
        }
    }

    /// Queue `event` for every subscriber, dropping the ones that cannot take it.
    fn broadcast(&mut self, session_id: &str, event: &GenerationEvent) {
        self.subscribers.retain(|subscriber| {
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(session = %session_id, subscriber = subscriber.id, "Subscriber queue full, disconnecting");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(session = %session_id, subscriber = subscriber.id, "Subscriber gone");
                    false
                }
            }
        });
    }
}

/// One presentation: its request, accumulated output and live subscribers.
///
/// Only the orchestrator task records events. Status polling and WebSocket
/// attach read through the same lock, so an event is either part of a
/// snapshot or delivered live, never both.
pub struct GenerationSession {
    id: String,
    request: GenerationRequest,
    state: RwLock<SessionState>,
    cancel: CancellationToken,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl GenerationSession {
    pub fn new(id: impl Into<String>, request: GenerationRequest) -> Self {
        let theme_states = vec![ThemeStage::Pending; request.themes.len()];
        Self {
            id: id.into(),
            request,
            state: RwLock::new(SessionState {
                status: PresentationStatus::Generating,
                theme_states,
                slides: Vec::new(),
                narrations: Vec::new(),
                audio_files: Vec::new(),
                subscribers: Vec::new(),
                next_subscriber: 0,
            }),
            cancel: CancellationToken::new(),
            task: StdMutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn themes(&self) -> &[SlideTheme] {
        &self.request.themes
    }

    pub fn language(&self) -> &str {
        &self.request.language
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn status(&self) -> PresentationStatus {
        self.state.read().await.status
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscribers.len()
    }

    pub async fn snapshot(&self) -> PresentationSnapshot {
        let state = self.state.read().await;
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &SessionState) -> PresentationSnapshot {
        PresentationSnapshot {
            slide_id: self.id.clone(),
            project_id: self.request.project_id.clone(),
            status: state.status,
            language: self.request.language.clone(),
            themes: self.request.themes.clone(),
            theme_states: state.theme_states.clone(),
            slides: state.slides.clone(),
            narrations: state.narrations.clone(),
            audio_files: state.audio_files.clone(),
        }
    }

    /// Snapshot the state and register a subscriber in one step.
    ///
    /// A finished presentation hands back the snapshot with an already closed
    /// queue.
    pub async fn attach(&self) -> Subscription {
        let mut state = self.state.write().await;
        let catch_up = GenerationEvent::PresentationState(Box::new(self.snapshot_of(&state)));
        let (tx, events) = mpsc::channel(SUBSCRIBER_CAPACITY);

        let id = state.next_subscriber;
        state.next_subscriber += 1;
        if !state.status.is_terminal() {
            state.subscribers.push(Subscriber { id, tx });
        }
        debug!(session = %self.id, subscriber = id, "Subscriber attached");

        Subscription {
            id,
            catch_up,
            events,
        }
    }

    /// Fold `event` into the state and send it to every subscriber.
    ///
    /// The completion event is the last one: subscribers are released after
    /// it so their queues close once drained.
    pub async fn record(&self, event: GenerationEvent) {
        let mut state = self.state.write().await;
        if state.status.is_terminal() {
            debug!(session = %self.id, kind = event.kind(), "Event after end of run ignored");
            return;
        }
        state.fold(&event);
        state.broadcast(&self.id, &event);
        if state.status.is_terminal() {
            state.subscribers.clear();
        }
    }

    /// Mark the run cancelled and close every subscriber queue.
    pub async fn mark_cancelled(&self) -> bool {
        let mut state = self.state.write().await;
        if state.status.is_terminal() {
            return false;
        }
        state.status = PresentationStatus::Cancelled;
        state.subscribers.clear();
        true
    }

    pub(crate) fn set_task(&self, handle: JoinHandle<()>) {
        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    /// Request cancellation; the run stops at its next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish. Returns immediately if already joined.
    pub async fn join(&self) {
        let handle = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(session = %self.id, error = %e, "Generation task ended abnormally");
        }
    }
}

impl std::fmt::Debug for GenerationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationSession")
            .field("id", &self.id)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}
