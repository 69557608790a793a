use miette::Diagnostic;
use thiserror::Error;

use crate::cache::SpeechError;
use crate::mcp::ToolError;
use crate::providers::ProviderError;

#[derive(Error, Diagnostic, Debug)]
pub enum GenerationError {
    #[error("At least one theme is required")]
    #[diagnostic(code(presenter::generation::no_themes))]
    NoThemes,

    #[error("Project ID is required")]
    #[diagnostic(code(presenter::generation::missing_project))]
    MissingProject,

    #[error("Presentation not found: {id}")]
    #[diagnostic(code(presenter::generation::not_found))]
    NotFound { id: String },

    #[error("Failed to fetch project data: {0}")]
    #[diagnostic(
        code(presenter::generation::data),
        help("Check MCP_BACKLOG_URL and the Backlog credentials.")
    )]
    Data(#[from] ToolError),

    #[error("Text generation failed: {0}")]
    #[diagnostic(code(presenter::generation::text))]
    Text(#[from] ProviderError),

    #[error("Speech synthesis failed: {0}")]
    #[diagnostic(code(presenter::generation::speech))]
    Speech(#[from] SpeechError),
}
