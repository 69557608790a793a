//! V1 API handlers.

mod projects;
mod slides;
mod speech;

#[cfg(test)]
mod projects_test;
#[cfg(test)]
mod speech_test;

pub use projects::*;
pub use slides::*;
pub use speech::*;
