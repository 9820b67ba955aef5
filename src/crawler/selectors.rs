//! Configuration-driven page parser
//!
//! Maps output field names to CSS selectors so the binary can crawl and
//! scrape without any domain code. Each field holds the trimmed text of the
//! first matching element, or null when nothing matches.

use crate::config::{NextLinkRule, ParserConfig};
use crate::crawler::parser::{
    first_link, first_text, link_after, Document, PageParser, PaginatedParser,
};
use crate::{BoxError, ConfigError, ConfigResult};
use scraper::Selector;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextLinkKind {
    Anchor,
    AfterCurrent,
}

/// A [`PageParser`] built from the `[parser]` configuration section
#[derive(Debug, Clone)]
pub struct SelectorParser {
    fields: Vec<(String, Selector)>,
    next_link: Option<(NextLinkKind, Selector)>,
}

impl SelectorParser {
    /// Compiles every selector of the `[parser]` section
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidSelector` for the first selector that does not parse.
    pub fn from_config(config: &ParserConfig) -> ConfigResult<Self> {
        let fields = config
            .fields
            .iter()
            .map(|(name, selector)| -> ConfigResult<(String, Selector)> {
                Ok((name.clone(), compile(selector)?))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let next_link = match &config.next_link {
            Some(NextLinkRule::Anchor { selector }) => {
                Some((NextLinkKind::Anchor, compile(selector)?))
            }
            Some(NextLinkRule::AfterCurrent { selector }) => {
                Some((NextLinkKind::AfterCurrent, compile(selector)?))
            }
            None => None,
        };

        Ok(Self { fields, next_link })
    }

    /// Field names in output order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn follows_links(&self) -> bool {
        self.next_link.is_some()
    }
}

impl PageParser for SelectorParser {
    type Output = Map<String, Value>;

    fn parse(&self, document: &Document) -> Result<Self::Output, BoxError> {
        Ok(self
            .fields
            .iter()
            .map(|(name, selector)| {
                let value =
                    first_text(document.html(), selector).map_or(Value::Null, Value::String);
                (name.clone(), value)
            })
            .collect())
    }
}

impl PaginatedParser for SelectorParser {
    fn next_link(&self, document: &Document, current: &str) -> Result<Option<String>, BoxError> {
        Ok(match &self.next_link {
            Some((NextLinkKind::Anchor, selector)) => {
                first_link(document.html(), selector, document.url())
            }
            Some((NextLinkKind::AfterCurrent, selector)) => {
                link_after(document.html(), selector, document.url(), current)
            }
            None => None,
        })
    }
}

fn compile(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}
