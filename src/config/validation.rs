use crate::config::types::{
    CacheConfig, Config, CrawlerConfig, HttpConfig, ParserConfig, ScraperConfig,
};
use crate::url::parse_http_url;
use crate::ConfigError;
use scraper::Selector;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_cache_config(&config.cache)?;
    validate_crawler_config(&config.crawler)?;
    validate_scraper_config(&config.scraper)?;
    validate_parser_config(&config.parser)?;
    Ok(())
}

/// Validates retrying client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if !config.timeout_seconds.is_finite() || config.timeout_seconds <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "timeout-seconds must be > 0, got {}",
            config.timeout_seconds
        )));
    }

    if !config.backoff_factor.is_finite() || config.backoff_factor < 0.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be >= 0, got {}",
            config.backoff_factor
        )));
    }

    if let Some(code) = config
        .retry_status_codes
        .iter()
        .find(|code| !(100..=599).contains(*code))
    {
        return Err(ConfigError::Validation(format!(
            "retry-status-codes must be HTTP statuses (100-599), got {}",
            code
        )));
    }

    if let Some(user_agent) = &config.user_agent {
        if user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user-agent cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.output_directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output-directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if let Some(start_link) = &config.start_link {
        validate_link("start-link", start_link)?;
    }
    validate_limit("crawler.limit", config.limit)
}

/// Validates link scraper configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    for link in &config.links {
        validate_link("links", link)?;
    }
    validate_limit("scraper.limit", config.limit)
}

/// Validates that every parser selector compiles
fn validate_parser_config(config: &ParserConfig) -> Result<(), ConfigError> {
    for (field, selector) in &config.fields {
        if field.is_empty() {
            return Err(ConfigError::Validation(
                "parser field names cannot be empty".to_string(),
            ));
        }
        validate_selector(selector)?;
    }

    if let Some(rule) = &config.next_link {
        validate_selector(rule.selector())?;
    }

    Ok(())
}

fn validate_link(key: &str, link: &str) -> Result<(), ConfigError> {
    parse_http_url(link)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} entry '{}': {}", key, link, e)))
}

fn validate_limit(key: &str, limit: Option<usize>) -> Result<(), ConfigError> {
    match limit {
        Some(0) => Err(ConfigError::Validation(format!("{} must be >= 1", key))),
        _ => Ok(()),
    }
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: e.to_string(),
        })
}
