//! Sample-level processing used while preparing and mixing tracks.

pub mod bridge;
pub mod crossfade;
pub mod level;
pub mod loop_pad;
pub mod normalize;
