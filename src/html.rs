//! Narrow HTML query interface over the `scraper` crate.
//!
//! The crawler only needs "elements matching a selector" and "attribute or
//! text of an element", so that is all this module exposes. Swapping the
//! parsing engine means touching this file only.
//!
//! `scraper::Html` is not `Send`; parse, query, and copy out owned values
//! before the next `.await`.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// A matched element, borrowed from its [`HtmlDocument`].
pub type Element<'a> = ElementRef<'a>;

/// Errors from querying a document.
#[derive(Debug, Error)]
pub enum HtmlError {
    /// The CSS selector could not be parsed.
    #[error("invalid CSS selector {selector:?}: {message}")]
    InvalidSelector {
        /// The selector as given.
        selector: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// A parsed HTML page.
#[derive(Debug)]
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    /// Parses a full HTML document. Malformed markup is recovered, never rejected.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    /// Returns all elements matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`HtmlError::InvalidSelector`] if `selector` is not valid CSS.
    pub fn query(&self, selector: &str) -> Result<Vec<Element<'_>>, HtmlError> {
        let parsed = parse_selector(selector)?;
        Ok(self.html.select(&parsed).collect())
    }

    /// Returns the first element matching `selector`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`HtmlError::InvalidSelector`] if `selector` is not valid CSS.
    pub fn first(&self, selector: &str) -> Result<Option<Element<'_>>, HtmlError> {
        let parsed = parse_selector(selector)?;
        Ok(self.html.select(&parsed).next())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, HtmlError> {
    Selector::parse(selector).map_err(|e| HtmlError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Returns the value of attribute `name` on `element`.
#[must_use]
pub fn attribute<'a>(element: &Element<'a>, name: &str) -> Option<&'a str> {
    element.value().attr(name)
}

/// Returns the element's text content with runs of whitespace collapsed.
#[must_use]
pub fn text(element: &Element<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the element's inner markup.
#[must_use]
pub fn inner_html(element: &Element<'_>) -> String {
    element.inner_html()
}
