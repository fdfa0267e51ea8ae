//! Language-model narration of scan findings.
//!
//! A [`Narrator`] turns a prompt into a stream of text fragments. The
//! report stage concatenates the fragments and mirrors each one to the
//! observer as it arrives.

mod openai;
mod prompt;

pub use openai::OpenAiNarrator;
pub use prompt::{build_prompt, SYSTEM_PROMPT};

use crate::error::NarratorError;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Incremental narrator output.
pub type FragmentStream = BoxStream<'static, Result<String, NarratorError>>;

/// Instructions and user prompt for one narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationRequest {
    pub system: String,
    pub prompt: String,
}

impl NarrationRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
pub trait Narrator: Send + Sync {
    fn name(&self) -> &str;

    /// Starts a streaming narration.
    ///
    /// Errors may surface either here or as an item of the stream.
    async fn narrate(&self, request: NarrationRequest) -> Result<FragmentStream, NarratorError>;
}
