//! Feed input and document handling.
//!
//! This module covers the two ends of the filter pipeline:
//!
//! - **Input**: Read one RSS document from a stream, with a readiness
//!   timeout and truncation after the closing `</rss>` tag
//! - **Document**: Parse the XML into a mutable tree, locate channel items,
//!   remove items, and serialize the result
//!
//! # Architecture
//!
//! - [`input`] - Async stream reader built on `tokio::io`
//! - [`document`] - Arena-backed XML tree built on `quick-xml` events
//!
//! # Example
//!
//! ```ignore
//! use rssfilter::feed::{FeedDocument, FeedInput};
//!
//! let mut input = FeedInput::new(tokio::io::stdin());
//! if input.wait_ready(3).await? {
//!     let doc = FeedDocument::parse(&input.read_all().await?)?;
//!     let items = doc.channel_items()?;
//! }
//! ```

mod document;
mod input;

pub use document::{DocumentError, FeedDocument, Item};
pub use input::{truncate_after_closing_tag, FeedInput, InputError, RSS_CLOSING_TAG};
