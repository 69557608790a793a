use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// What a slide is about. Unknown names are kept as custom themes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SlideTheme {
    ProjectOverview,
    ProjectProgress,
    IssueManagement,
    RiskAnalysis,
    TeamCollaboration,
    DocumentManagement,
    CodebaseActivity,
    Notifications,
    PredictiveAnalysis,
    SummaryPlan,
    Custom(String),
}

impl SlideTheme {
    pub fn as_str(&self) -> &str {
        match self {
            SlideTheme::ProjectOverview => "project_overview",
            SlideTheme::ProjectProgress => "project_progress",
            SlideTheme::IssueManagement => "issue_management",
            SlideTheme::RiskAnalysis => "risk_analysis",
            SlideTheme::TeamCollaboration => "team_collaboration",
            SlideTheme::DocumentManagement => "document_management",
            SlideTheme::CodebaseActivity => "codebase_activity",
            SlideTheme::Notifications => "notifications",
            SlideTheme::PredictiveAnalysis => "predictive_analysis",
            SlideTheme::SummaryPlan => "summary_plan",
            SlideTheme::Custom(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "project_overview" | "overview" => SlideTheme::ProjectOverview,
            "project_progress" | "progress" => SlideTheme::ProjectProgress,
            "issue_management" | "issues" => SlideTheme::IssueManagement,
            "risk_analysis" | "risks" => SlideTheme::RiskAnalysis,
            "team_collaboration" | "team" => SlideTheme::TeamCollaboration,
            "document_management" => SlideTheme::DocumentManagement,
            "codebase_activity" => SlideTheme::CodebaseActivity,
            "notifications" => SlideTheme::Notifications,
            "predictive_analysis" => SlideTheme::PredictiveAnalysis,
            "summary_plan" => SlideTheme::SummaryPlan,
            other => SlideTheme::Custom(other.to_string()),
        }
    }
}

impl FromStr for SlideTheme {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SlideTheme::parse(s))
    }
}

impl From<String> for SlideTheme {
    fn from(value: String) -> Self {
        SlideTheme::parse(&value)
    }
}

impl From<SlideTheme> for String {
    fn from(theme: SlideTheme) -> Self {
        theme.as_str().to_string()
    }
}

impl fmt::Display for SlideTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backlog project identifier; JSON may carry it as a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The id as Backlog's numeric filters want it, when it is numeric.
    pub fn to_json(&self) -> serde_json::Value {
        match self.0.parse::<u64>() {
            Ok(n) => serde_json::Value::from(n),
            Err(_) => serde_json::Value::String(self.0.clone()),
        }
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => ProjectId(s),
            Raw::Number(n) => ProjectId(n.to_string()),
        })
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PresentationStatus {
    Generating,
    Completed,
    Cancelled,
}

impl PresentationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PresentationStatus::Generating)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeStage {
    Pending,
    GeneratingContent,
    GeneratingNarration,
    GeneratingAudio,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlideContent {
    pub index: usize,
    #[schema(value_type = String, example = "project_overview")]
    pub theme: SlideTheme,
    pub title: String,
    pub markdown: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlideNarration {
    pub slide_index: usize,
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlideAudio {
    pub slide_index: usize,
    pub audio_url: String,
    /// Estimated spoken length in seconds.
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideStarted {
    pub slide_index: usize,
    pub theme: SlideTheme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationComplete {
    pub total_slides: usize,
    pub completed_slides: usize,
    /// Wall-clock generation time in seconds.
    pub duration: f64,
}

pub const GENERATION_ERROR: &str = "GENERATION_ERROR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub message: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_index: Option<usize>,
}

impl GenerationFailure {
    pub fn for_slide(slide_index: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: GENERATION_ERROR.to_string(),
            slide_index: Some(slide_index),
        }
    }
}

/// Accumulated state of one presentation, as polled or sent on attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresentationSnapshot {
    pub slide_id: String,
    #[schema(value_type = String)]
    pub project_id: ProjectId,
    pub status: PresentationStatus,
    pub language: String,
    #[schema(value_type = Vec<String>)]
    pub themes: Vec<SlideTheme>,
    pub theme_states: Vec<ThemeStage>,
    pub slides: Vec<SlideContent>,
    pub narrations: Vec<SlideNarration>,
    pub audio_files: Vec<SlideAudio>,
}

/// One WebSocket frame: `{"type": <kind>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GenerationEvent {
    SlideGenerationStarted(SlideStarted),
    SlideContent(SlideContent),
    SlideNarration(SlideNarration),
    SlideAudio(SlideAudio),
    PresentationComplete(PresentationComplete),
    Error(GenerationFailure),
    PresentationState(Box<PresentationSnapshot>),
}

impl GenerationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationEvent::SlideGenerationStarted(_) => "slide_generation_started",
            GenerationEvent::SlideContent(_) => "slide_content",
            GenerationEvent::SlideNarration(_) => "slide_narration",
            GenerationEvent::SlideAudio(_) => "slide_audio",
            GenerationEvent::PresentationComplete(_) => "presentation_complete",
            GenerationEvent::Error(_) => "error",
            GenerationEvent::PresentationState(_) => "presentation_state",
        }
    }

    /// Slide this event belongs to, if any.
    pub fn slide_index(&self) -> Option<usize> {
        match self {
            GenerationEvent::SlideGenerationStarted(e) => Some(e.slide_index),
            GenerationEvent::SlideContent(e) => Some(e.index),
            GenerationEvent::SlideNarration(e) => Some(e.slide_index),
            GenerationEvent::SlideAudio(e) => Some(e.slide_index),
            GenerationEvent::Error(e) => e.slide_index,
            _ => None,
        }
    }
}
