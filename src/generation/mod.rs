//! Presentation generation: per-theme data, content, narration and audio,
//! streamed to WebSocket subscribers as it is produced.
//!
//! ```text
//! Orchestrator::start ─► GenerationSession ◄── EventHub::attach (WebSocket)
//!        │                     ▲
//!        └─ run task ──────────┘ record(event): fold into state + fan out
//! ```

mod error;
mod hub;
pub mod models;
mod orchestrator;
mod plans;
pub mod prompts;
mod session;


pub use error::GenerationError;
pub use hub::EventHub;
pub use models::{
    GenerationEvent, PresentationSnapshot, PresentationStatus, ProjectId, SlideTheme, ThemeStage,
};
pub use orchestrator::Orchestrator;
pub use plans::ProjectData;
pub use session::{GenerationRequest, GenerationSession, SUBSCRIBER_CAPACITY, Subscription};
