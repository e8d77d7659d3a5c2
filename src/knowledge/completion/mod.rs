//! Completion model modules.

pub mod completion_model;

pub use completion_model::{CompletionFuture, CompletionProvider, OllamaCompletion};
