//! Whole-pipeline entry points, one per engine.
//!
//! Each takes a parameter struct mirroring a command-line interface, checks
//! that the options make sense together, and then trains or loads a model and
//! applies it. Everything the engines log goes through `tracing`; `verbose`
//! additionally reports timings and quality metrics at info level.

mod lsh;
mod softmax;

pub use self::lsh::{LshProgramOutput, LshProgramParams, run_lsh};
pub use self::softmax::{SoftmaxProgramOutput, SoftmaxProgramParams, run_softmax};
