//! Loop-length planning and the streaming mixer.

mod mixer;
pub mod plan;
mod track;

pub use mixer::{MixSummary, StreamingMixer};
pub use plan::{reconcile, LoopPlan, PlanStrategy};
pub use track::TrackStream;
