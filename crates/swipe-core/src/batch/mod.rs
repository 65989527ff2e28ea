//! Background maintenance jobs.
//!
//! [`BatchProcessor`] keeps embeddings fresh and re-clusters posts on two
//! independent timers; [`BatchRunReport`] summarizes each run.

mod processor;
mod progress;

pub use processor::{BatchProcessor, ForcedUpdate};
pub use progress::{BatchProgress, BatchRunReport, ProgressTimer};
