pub mod sigma_clip;
pub mod stats;

pub use sigma_clip::{sigma_clip_stack, SigmaClipParams};
