//! Creative generation pipeline — turns a campaign brief into branded,
//! locale-specific creatives in three fixed aspect ratios, persists them,
//! and reports per-variant quality/compliance checks.

pub mod brief;
pub mod checks;
pub mod compose;
pub mod hero;
pub mod orchestrator;
pub mod overlay;
pub mod resolve;
pub mod storage;
pub mod stream;

pub use compose::{Compositor, RenderOptions};
pub use hero::{HeroImageGenerator, OpenAiImageGenerator};
pub use orchestrator::{Pipeline, RunRequest};
pub use storage::{FsSink, MemorySink, StorageSink, StoredObject};
pub use stream::{run_streamed, PipelineEvent};
