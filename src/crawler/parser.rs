//! Page parser contract and HTML document helpers
//!
//! Domain code plugs into the engines by implementing:
//! - [`PageParser`]: turns a parsed document into structured data
//! - [`PaginatedParser`]: additionally yields the next page link, for crawls
//!
//! Parsers are synchronous. The [`Document`] they receive is built and
//! dropped between network awaits, so it never has to be `Send`.

use crate::url::same_page;
use crate::BoxError;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

/// A parsed HTML page together with the URL it was served from
pub struct Document {
    html: Html,
    url: Url,
}

impl Document {
    /// Parses `body` as an HTML document served from `url`
    ///
    /// # Example
    ///
    /// ```
    /// use pagetrail::crawler::Document;
    /// use url::Url;
    ///
    /// let html = r#"<html><body><h1>Hello</h1><a href="/next">next</a></body></html>"#;
    /// let doc = Document::parse(html, Url::parse("https://example.com/page").unwrap());
    /// assert_eq!(doc.text("h1").unwrap(), Some("Hello".to_string()));
    /// assert_eq!(doc.link("a").unwrap(), Some("https://example.com/next".to_string()));
    /// ```
    pub fn parse(body: &str, url: Url) -> Self {
        Self {
            html: Html::parse_document(body),
            url,
        }
    }

    /// The underlying `scraper` document
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// The URL the page was served from (after redirects)
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// All elements matching a CSS selector, in document order
    pub fn select_all(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, BoxError> {
        let selector = compile(selector)?;
        Ok(self.html.select(&selector).collect())
    }

    /// Trimmed text of the first element matching `selector`
    pub fn text(&self, selector: &str) -> Result<Option<String>, BoxError> {
        let selector = compile(selector)?;
        Ok(first_text(&self.html, &selector))
    }

    /// Attribute value of the first element matching `selector`
    pub fn attr(&self, selector: &str, attribute: &str) -> Result<Option<String>, BoxError> {
        let selector = compile(selector)?;
        Ok(self
            .html
            .select(&selector)
            .find_map(|element| element.value().attr(attribute))
            .map(str::to_string))
    }

    /// Absolute `href` of the first matching element that carries a usable link
    pub fn link(&self, selector: &str) -> Result<Option<String>, BoxError> {
        let selector = compile(selector)?;
        Ok(first_link(&self.html, &selector, &self.url))
    }

    /// Resolves `href` against the page URL
    pub fn resolve(&self, href: &str) -> Option<String> {
        resolve_link(href, &self.url)
    }

    /// Walks a list of pagination anchors and returns the link that follows
    /// the one pointing at `current`
    ///
    /// URLs are compared with surrounding slashes stripped, so
    /// `https://site/list` and `https://site/list/` name the same page.
    /// Returns `None` when `current` is absent or is the last anchor.
    pub fn link_after(&self, selector: &str, current: &str) -> Result<Option<String>, BoxError> {
        let selector = compile(selector)?;
        Ok(link_after(&self.html, &selector, &self.url, current))
    }
}

/// Turns a parsed page into domain data
///
/// Any error returned here is wrapped as a parse error carrying the page URL;
/// it fails the whole fetch step.
pub trait PageParser: Send + Sync {
    /// The structured data stored in the record's `data` field
    type Output: Serialize;

    /// Extracts the domain data from a page
    fn parse(&self, document: &Document) -> Result<Self::Output, BoxError>;
}

/// A parser for paginated listings
///
/// The crawler stores the page data, which must serialize to a JSON object,
/// with an extra `next_link` field taken from [`PaginatedParser::next_link`].
pub trait PaginatedParser: PageParser {
    /// Returns the absolute URL of the following page, or `None` on the last page
    ///
    /// `current` is the link the crawler requested, before redirects.
    fn next_link(&self, document: &Document, current: &str) -> Result<Option<String>, BoxError>;
}

impl<P: PageParser + ?Sized> PageParser for std::sync::Arc<P> {
    type Output = P::Output;

    fn parse(&self, document: &Document) -> Result<Self::Output, BoxError> {
        (**self).parse(document)
    }
}

impl<P: PaginatedParser + ?Sized> PaginatedParser for std::sync::Arc<P> {
    fn next_link(&self, document: &Document, current: &str) -> Result<Option<String>, BoxError> {
        (**self).next_link(document, current)
    }
}

/// Compiles a CSS selector, reporting failures as parser errors
pub fn compile(selector: &str) -> Result<Selector, BoxError> {
    Selector::parse(selector).map_err(|e| format!("invalid selector '{selector}': {e}").into())
}

pub(crate) fn first_text(html: &Html, selector: &Selector) -> Option<String> {
    html.select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
}

pub(crate) fn first_link(html: &Html, selector: &Selector, base_url: &Url) -> Option<String> {
    html.select(selector)
        .filter_map(|element| element.value().attr("href"))
        .find_map(|href| resolve_link(href, base_url))
}

pub(crate) fn link_after(
    html: &Html,
    selector: &Selector,
    base_url: &Url,
    current: &str,
) -> Option<String> {
    let mut found_current = false;
    for element in html.select(selector) {
        let Some(link) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if found_current {
            return Some(link);
        }
        if same_page(&link, current) {
            found_current = true;
        }
    }
    None
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
