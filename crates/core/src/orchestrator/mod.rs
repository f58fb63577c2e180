//! Research orchestrator.
//!
//! Drives a session through repeated rounds until a terminal state:
//! - **Resolving**: classify each target and turn it into URLs (sequential)
//! - **Fetching**: fetch the round's URLs in bounded concurrent batches
//! - **Reviewing**: hand the results to the refiner for the next targets

mod config;
mod events;
mod runner;
mod types;

pub use config::ResearchConfig;
pub use events::ResearchEvent;
pub use runner::{Collaborators, ResearchOrchestrator};
pub use types::{
    IterationSummary, ResearchError, ResearchIteration, ResearchOutcome, ResearchParams,
    SessionSnapshot, SessionState,
};
