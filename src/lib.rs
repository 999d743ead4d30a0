pub mod classify;
pub mod clients;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod recovery;
pub mod schemas;

pub use error::{PipelineError, Result, Stage, StageFailure};
pub use pipeline::progress::{ProgressEvent, ProgressSink, ProgressStage, ProgressStatus};
pub use pipeline::{PersonaPipeline, PersonaRecord};

// Load env from a simple, standardized location resolution.
// This uses dotenvy::dotenv().ok() which loads .env if present and silently ignores if missing.
pub fn load_env() {
    let _ = dotenvy::dotenv();
}
