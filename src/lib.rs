pub mod checker;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod narrator;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod retry;

pub use config::Config;
pub use error::{NarratorError, ScanError};
pub use model::{DependencyEntry, Finding, RepositoryReference, Report, ScanOutcome, ScanResult};
pub use narrator::{Narrator, OpenAiNarrator};
pub use observer::{ScanEvent, ScanObserver};
pub use pipeline::Pipeline;
