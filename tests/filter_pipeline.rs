//! Integration tests for the filter pipeline: feed bytes in, filtered feed bytes out.
//!
//! These exercise parsing, the filter pass, and serialization together,
//! plus the stream reader feeding them.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use regex::Regex;
use rssfilter::feed::{DocumentError, FeedDocument, FeedInput, InputError};
use rssfilter::filter::{FilterReport, PatternSet};
use rssfilter::filter_feed;

fn build_feed(titles: &[String], pretty: bool) -> String {
    let (nl, i1, i2, i3) = if pretty {
        ("\n", "  ", "    ", "      ")
    } else {
        ("", "", "", "")
    };
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">{nl}{i1}<channel>{nl}{i2}<title>Feed</title>"
    );
    for title in titles {
        xml.push_str(&format!(
            "{nl}{i2}<item>{nl}{i3}<title>{title}</title>{nl}{i3}<description>About {title}</description>{nl}{i2}</item>"
        ));
    }
    xml.push_str(&format!("{nl}{i1}</channel>{nl}</rss>\n"));
    xml
}

fn titles_of(output: &[u8]) -> Vec<String> {
    let doc = FeedDocument::parse(output).expect("Filtered output should be well-formed");
    doc.channel_items()
        .unwrap()
        .into_iter()
        .map(|item| doc.title_of(item).unwrap())
        .collect()
}

fn owned(titles: &[&str]) -> Vec<String> {
    titles.iter().map(|t| t.to_string()).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_recension_scenario() {
    let input = build_feed(&owned(&["Recension: Foo", "News", "Recension: Bar"]), true);
    let patterns = PatternSet::from_patterns(&["^Recension"]);

    let (output, report) = filter_feed(input.as_bytes(), &patterns).unwrap();

    assert_eq!(report, FilterReport { kept: 2, removed: 1 });
    assert_eq!(
        String::from_utf8(output).unwrap(),
        build_feed(&owned(&["Recension: Foo", "Recension: Bar"]), true)
    );
}

#[test]
fn test_empty_channel_is_unchanged() {
    let input = build_feed(&[], true);
    let patterns = PatternSet::from_patterns(&["^Recension"]);

    let (output, report) = filter_feed(input.as_bytes(), &patterns).unwrap();

    assert_eq!(report, FilterReport::default());
    assert_eq!(String::from_utf8(output).unwrap(), input);
}

#[test]
fn test_invalid_pattern_does_not_affect_valid_one() {
    let input = build_feed(&owned(&["Recension: Foo", "News", "Recension: Bar"]), true);
    let patterns = PatternSet::from_patterns(&["(unclosed", "^Recension"]);

    let (output, _) = filter_feed(input.as_bytes(), &patterns).unwrap();

    assert_eq!(titles_of(&output), vec!["Recension: Foo", "Recension: Bar"]);
    assert_eq!(patterns.invalid_patterns(), vec!["(unclosed"]);
}

#[test]
fn test_default_patterns_keep_every_item() {
    let input = build_feed(&owned(&["a", "b", "c"]), true);
    let (output, report) = filter_feed(input.as_bytes(), &PatternSet::new()).unwrap();

    assert_eq!(report.removed, 0);
    assert_eq!(String::from_utf8(output).unwrap(), input);
}

#[test]
fn test_compact_feed_filtering() {
    let input = build_feed(&owned(&["keep", "drop", "keep too"]), false);
    let patterns = PatternSet::from_patterns(&["^keep"]);

    let (output, _) = filter_feed(input.as_bytes(), &patterns).unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        build_feed(&owned(&["keep", "keep too"]), false)
    );
}

#[test]
fn test_malformed_input_is_parse_error() {
    let result = filter_feed(b"<rss><channel><item></channel></rss>", &PatternSet::new());
    assert!(matches!(result, Err(DocumentError::Parse(_))));
}

#[test]
fn test_missing_channel_is_structure_error() {
    let result = filter_feed(b"<rss><item><title>x</title></item></rss>", &PatternSet::new());
    assert!(matches!(result, Err(DocumentError::Structure(_))));
}

// ============================================================================
// Stream input feeding the pipeline
// ============================================================================

#[tokio::test]
async fn test_trailing_garbage_after_closing_tag_is_dropped() {
    let mut raw = build_feed(&owned(&["Recension: Foo", "News"]), true).into_bytes();
    raw.extend_from_slice(b"\0\0<partial");

    let mut input = FeedInput::new(raw.as_slice());
    assert!(input.wait_ready(3).await.unwrap());
    let feed = input.read_all().await.unwrap();

    let (output, _) = filter_feed(&feed, &PatternSet::from_patterns(&["^Recension"])).unwrap();
    assert_eq!(titles_of(&output), vec!["Recension: Foo"]);
}

#[tokio::test]
async fn test_missing_closing_tag_is_truncation_error() {
    let raw = b"<?xml version=\"1.0\"?>\n<rss><channel><item><title>x</title></item></channel>";
    let mut input = FeedInput::new(&raw[..]);
    assert!(input.wait_ready(3).await.unwrap());
    assert!(matches!(
        input.read_all().await,
        Err(InputError::Truncation(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_no_input_times_out() {
    let (_writer, reader) = tokio::io::duplex(64);
    let mut input = FeedInput::new(reader);
    assert!(!input.wait_ready(3).await.unwrap());
    assert_eq!(
        InputError::Timeout(3).to_string(),
        "No feed on input within 3 seconds"
    );
}

// ============================================================================
// Properties
// ============================================================================

fn titles_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[abc ]{0,5}", 0..10)
}

fn patterns_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::sample::select(vec!["^a", "b$", "c", "^$", "a b", "^[bc]+$"]).prop_map(String::from),
        1..3,
    )
}

proptest! {
    #[test]
    fn prop_item_kept_iff_some_pattern_matches(
        titles in titles_strategy(),
        patterns in patterns_strategy(),
        pretty in any::<bool>(),
    ) {
        let input = build_feed(&titles, pretty);
        let set = PatternSet::from_patterns(&patterns);
        let (output, report) = filter_feed(input.as_bytes(), &set).unwrap();

        let compiled: Vec<Regex> = patterns.iter().map(|p| Regex::new(p).unwrap()).collect();
        let expected: Vec<String> = titles
            .iter()
            .filter(|t| compiled.iter().any(|re| re.is_match(t)))
            .cloned()
            .collect();

        prop_assert_eq!(titles_of(&output), expected.clone());
        prop_assert_eq!(report.kept, expected.len());
        prop_assert_eq!(report.kept + report.removed, titles.len());
        // Same layout as a feed built from only the kept titles
        prop_assert_eq!(String::from_utf8(output).unwrap(), build_feed(&expected, pretty));
    }

    #[test]
    fn prop_filtering_is_idempotent(
        titles in titles_strategy(),
        patterns in patterns_strategy(),
        pretty in any::<bool>(),
    ) {
        let input = build_feed(&titles, pretty);
        let set = PatternSet::from_patterns(&patterns);

        let (once, _) = filter_feed(input.as_bytes(), &set).unwrap();
        let (twice, report) = filter_feed(&once, &set).unwrap();

        prop_assert_eq!(report.removed, 0);
        prop_assert_eq!(once, twice);
    }
}
