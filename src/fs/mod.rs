//! Local filesystem helpers
//!
//! The pre-transfer survey walks the source once to size the run; the
//! transfer itself traverses again, in parallel, inside worker tasks.

mod scanner;

pub use scanner::{survey, Survey};
