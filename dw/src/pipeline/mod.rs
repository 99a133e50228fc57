//! Documentation pipeline
//!
//! ```text
//! INIT -> BUILD_REQUEST || ANALYZE_REPO -> SELECT_DIRECTORY -> DETERMINE_STRATEGY
//!   CREATE: SELECT_PATTERN -> GENERATE_CONTENT -> WRITE_ARTIFACT -> DONE
//!   UPDATE: UPDATE_CONTENT -> WRITE_ARTIFACT -> DONE
//! any failure -> FAILED, cancellation -> CANCELLED
//! ```

mod error;
mod orchestrator;
mod progress;
mod run;
pub mod sections;
mod stage;

pub use error::{FailureKind, PipelineError};
pub use orchestrator::Orchestrator;
pub use progress::{ChannelProgress, LogProgress, NoProgress, ProgressEvent, ProgressSink};
pub use run::{PipelineRun, RunOutcome, RunReport};
pub use stage::Stage;
