//! Filter the items of an RSS feed by title.
//!
//! The binary reads a feed from stdin, drops every `<item>` whose title
//! matches none of the configured regular expressions, and writes the feed
//! back to stdout. The pieces are exposed here so they can be driven from
//! tests or other tools:
//!
//! - [`feed`] - stream input and the mutable XML document
//! - [`filter`] - pattern set and the filter pass
//! - [`config`] - config file and CLI settings resolution

pub mod config;
pub mod feed;
pub mod filter;

use feed::{DocumentError, FeedDocument};
use filter::{FilterReport, PatternSet};

/// Parses `input`, filters its items against `patterns`, and serializes the result.
pub fn filter_feed(
    input: &[u8],
    patterns: &PatternSet,
) -> Result<(Vec<u8>, FilterReport), DocumentError> {
    let mut doc = FeedDocument::parse(input)?;
    let report = filter::run(&mut doc, patterns)?;
    Ok((doc.serialize()?, report))
}
