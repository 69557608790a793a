use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::error::GenerationError;
use super::hub::EventHub;
use super::models::{
    GenerationEvent, GenerationFailure, PresentationComplete, SlideAudio, SlideContent,
    SlideNarration, SlideStarted, SlideTheme, ThemeStage,
};
use super::plans::ProjectData;
use super::prompts;
use super::session::{GenerationRequest, GenerationSession};
use crate::cache::SpeechService;
use crate::mcp::ToolInvoker;
use crate::providers::TextChain;

/// Voice selector passed to the speech chain; engines pick their default.
const DEFAULT_VOICE: &str = "";

/// A slide stage that went wrong, with the stage it happened in.
struct StageFailure {
    stage: ThemeStage,
    error: GenerationError,
}

impl StageFailure {
    fn new(stage: ThemeStage, error: impl Into<GenerationError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    fn message(&self, index: usize) -> String {
        let number = index + 1;
        match self.stage {
            ThemeStage::GeneratingNarration => {
                format!("Failed to generate narration for slide {number}: {}", self.error)
            }
            ThemeStage::GeneratingAudio => {
                format!("Failed to generate audio for slide {number}: {}", self.error)
            }
            _ => format!("Failed to generate slide {number}: {}", self.error),
        }
    }
}

impl fmt::Debug for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {:?}", self.error, self.stage)
    }
}

/// Collaborators shared by every run.
struct Pipeline {
    tools: Arc<dyn ToolInvoker>,
    text: TextChain,
    speech: SpeechService,
}

impl Pipeline {
    /// Data, content, narration and audio for one theme, recording each result.
    #[instrument(skip(self, session), fields(session = %session.id()))]
    async fn generate_slide(
        &self,
        session: &GenerationSession,
        index: usize,
        theme: &SlideTheme,
    ) -> Result<(), StageFailure> {
        let request = session.request();
        let language = request.language.as_str();

        let data = ProjectData::new(
            self.tools.as_ref(),
            &request.project_id,
            request.access_token.as_deref(),
        )
        .for_theme(theme)
        .await
        .map_err(|e| StageFailure::new(ThemeStage::GeneratingContent, e))?;

        let markdown = self
            .text
            .generate(&prompts::content_prompt(theme, language, &data))
            .await
            .map_err(|e| StageFailure::new(ThemeStage::GeneratingContent, e))?;
        let title = prompts::extract_title(&markdown, theme, language);
        session
            .record(GenerationEvent::SlideContent(SlideContent {
                index,
                theme: theme.clone(),
                title,
                markdown: markdown.clone(),
                html: None,
                generated_at: Utc::now(),
            }))
            .await;

        let narration = self
            .text
            .generate(&prompts::narration_prompt(&markdown, language))
            .await
            .map_err(|e| StageFailure::new(ThemeStage::GeneratingNarration, e))?;
        session
            .record(GenerationEvent::SlideNarration(SlideNarration {
                slide_index: index,
                text: narration.clone(),
                language: language.to_string(),
            }))
            .await;

        let speech = self
            .speech
            .synthesize(&narration, language, DEFAULT_VOICE)
            .await
            .map_err(|e| StageFailure::new(ThemeStage::GeneratingAudio, e))?;
        session
            .record(GenerationEvent::SlideAudio(SlideAudio {
                slide_index: index,
                audio_url: speech.audio.url,
                duration: speech.duration_secs,
            }))
            .await;

        Ok(())
    }

    async fn run(&self, session: Arc<GenerationSession>) {
        let started = Instant::now();
        let token = session.cancellation().clone();
        let themes = session.themes().to_vec();
        let mut completed = 0;

        info!(session = %session.id(), themes = themes.len(), "Presentation generation started");

        for (index, theme) in themes.iter().enumerate() {
            if token.is_cancelled() {
                break;
            }
            session
                .record(GenerationEvent::SlideGenerationStarted(SlideStarted {
                    slide_index: index,
                    theme: theme.clone(),
                }))
                .await;

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = self.generate_slide(&session, index, theme) => outcome,
            };

            match outcome {
                Ok(()) => completed += 1,
                Err(failure) => {
                    let message = failure.message(index);
                    error!(session = %session.id(), slide = index, error = ?failure, "{message}");
                    session
                        .record(GenerationEvent::Error(GenerationFailure::for_slide(
                            index, message,
                        )))
                        .await;
                }
            }
        }

        if token.is_cancelled() {
            session.mark_cancelled().await;
            info!(session = %session.id(), completed, "Presentation generation cancelled");
            return;
        }

        let duration = (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0;
        session
            .record(GenerationEvent::PresentationComplete(PresentationComplete {
                total_slides: themes.len(),
                completed_slides: completed,
                duration,
            }))
            .await;
        info!(session = %session.id(), completed, total = themes.len(), duration, "Presentation generation finished");
    }
}

/// Starts presentation runs and keeps them addressable by id.
#[derive(Clone)]
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    hub: EventHub,
}

impl Orchestrator {
    pub fn new(tools: Arc<dyn ToolInvoker>, text: TextChain, speech: SpeechService) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                tools,
                text,
                speech,
            }),
            hub: EventHub::new(),
        }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn tools(&self) -> &Arc<dyn ToolInvoker> {
        &self.pipeline.tools
    }

    pub fn speech(&self) -> &SpeechService {
        &self.pipeline.speech
    }

    pub fn session(&self, id: &str) -> Option<Arc<GenerationSession>> {
        self.hub.get(id)
    }

    /// Register a presentation and spawn its run.
    pub fn start(&self, request: GenerationRequest) -> Result<Arc<GenerationSession>, GenerationError> {
        if request.project_id.is_empty() {
            return Err(GenerationError::MissingProject);
        }
        if request.themes.is_empty() {
            return Err(GenerationError::NoThemes);
        }

        let session = Arc::new(GenerationSession::new(Uuid::new_v4().to_string(), request));
        self.hub.insert(Arc::clone(&session));

        let pipeline = Arc::clone(&self.pipeline);
        let run = Arc::clone(&session);
        let handle = tokio::spawn(async move { pipeline.run(run).await });
        session.set_task(handle);

        Ok(session)
    }

    /// Stop a run. Subscribers are disconnected and no completion is sent.
    pub async fn cancel(&self, id: &str) -> Result<(), GenerationError> {
        let session = self
            .hub
            .get(id)
            .ok_or_else(|| GenerationError::NotFound { id: id.to_string() })?;
        session.cancel();
        if session.mark_cancelled().await {
            info!(session = %id, "Presentation cancelled");
        }
        Ok(())
    }

    /// Cancel every run and wait for all of them.
    pub async fn shutdown(&self) {
        let sessions = self.hub.all();
        for session in &sessions {
            session.cancel();
        }
        for session in &sessions {
            session.join().await;
        }
    }
}
