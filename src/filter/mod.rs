//! Title filtering for feed items.
//!
//! - [`patterns`] - ordered regex filters with lazy, cached compilation
//! - [`pipeline`] - the pass that walks the channel and drops items whose
//!   title matches none of the filters

mod patterns;
mod pipeline;

pub use patterns::{Pattern, PatternError, PatternSet, DEFAULT_PATTERN};
pub use pipeline::{run, FilterReport};
