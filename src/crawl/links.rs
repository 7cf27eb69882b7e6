//! Picks the detail-page links out of a TOC document.

use crate::html::{self, HtmlDocument, HtmlError};

use super::types::Anchor;

const ANCHOR_SELECTOR: &str = "a[href]";

/// Returns every anchor whose `href` contains `filter`, in document order.
///
/// Matching is a plain case-sensitive substring test. An empty filter
/// matches every anchor that has an `href`. No match is an empty `Vec`,
/// not an error.
///
/// # Errors
///
/// Only fails if the internal anchor selector cannot be parsed.
pub fn extract_anchors(document: &HtmlDocument, filter: &str) -> Result<Vec<Anchor>, HtmlError> {
    let anchors = document
        .query(ANCHOR_SELECTOR)?
        .iter()
        .filter_map(|element| {
            let href = html::attribute(element, "href")?;
            href.contains(filter).then(|| Anchor {
                href: href.to_string(),
                display_text: html::text(element),
            })
        })
        .collect();
    Ok(anchors)
}
