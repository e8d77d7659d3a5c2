//! Knowledge engine wiring.

pub mod backends;

pub use backends::{KnowledgeBackends, KnowledgeEngine};
