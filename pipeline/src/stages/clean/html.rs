//! Markup stripping for row content
//!
//! Spreadsheet cells frequently carry article HTML. The assembled
//! `page_content` string is run through a fragment parse and reduced to its
//! text, which also passes plain text through untouched.

use scraper::Html;

/// Strip markup from `raw`, returning the concatenated text content.
pub fn extract_text(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    fragment
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}
