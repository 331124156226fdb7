use crate::config::types::{Config, CrawlerConfig, FieldSelectors, SourceConfig, UserAgentConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Splits a field selector into its CSS part and an optional attribute name
///
/// `"td:nth-child(3) a@href"` reads the `href` attribute, `"td.name"` reads
/// the element text. An `@` inside an attribute selector (`a[href*='@']`) is
/// part of the CSS.
pub fn split_selector(spec: &str) -> (&str, Option<&str>) {
    if let Some((css, attr)) = spec.rsplit_once('@') {
        let is_attr = !attr.is_empty()
            && attr
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if is_attr && !css.trim().is_empty() {
            return (css.trim(), Some(attr));
        }
    }
    (spec.trim(), None)
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates every source block
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for source in sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "source id '{}' is declared more than once",
                source.id
            )));
        }

        if source.category.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have a category",
                source.id
            )));
        }

        if source.units.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have at least one unit",
                source.id
            )));
        }

        for unit in &source.units {
            let url = Url::parse(&unit.url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid unit URL '{}': {}", unit.url, e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::Validation(format!(
                    "Unit URL '{}' must use HTTP or HTTPS",
                    unit.url
                )));
            }
        }

        let selectors = &source.selectors;
        validate_selector(&selectors.group_link)?;
        for css in [&selectors.record_row, &selectors.leaf_link]
            .into_iter()
            .flatten()
        {
            validate_selector(css)?;
        }

        if selectors.record_row.is_none() && selectors.leaf_link.is_none() {
            return Err(ConfigError::Validation(format!(
                "source '{}' needs a record-row or leaf-link selector",
                source.id
            )));
        }

        validate_field_selectors(&selectors.row)?;
        validate_field_selectors(&selectors.detail)?;
    }

    Ok(())
}

fn validate_field_selectors(fields: &FieldSelectors) -> Result<(), ConfigError> {
    for (field, spec) in fields.iter() {
        let (css, _) = split_selector(spec);
        validate_selector(css)
            .map_err(|e| ConfigError::InvalidSelector(format!("field '{}': {}", field, e)))?;
    }
    Ok(())
}

fn validate_selector(css: &str) -> Result<(), ConfigError> {
    Selector::parse(css)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", css, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{OutputConfig, SelectorConfig, UnitEntry};

    fn source(id: &str) -> SourceConfig {
        SourceConfig {
            id: id.to_string(),
            category: "Rugby".to_string(),
            units: vec![UnitEntry {
                label: "Top 14".to_string(),
                url: "https://rugby.example/teams".to_string(),
            }],
            selectors: SelectorConfig {
                group_link: "a.team".to_string(),
                record_row: None,
                leaf_link: Some("a.player".to_string()),
                row: FieldSelectors::default(),
                detail: FieldSelectors {
                    name: Some("h1".to_string()),
                    ..FieldSelectors::default()
                },
            },
        }
    }

    fn config(sources: Vec<SourceConfig>) -> Config {
        Config {
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "Harvester".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/bot".to_string(),
                contact_email: "bot@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: "./players.db".to_string(),
            },
            sources,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&config(vec![source("all.rugby")])).is_ok());
    }

    #[test]
    fn test_duplicate_source_ids() {
        let result = validate(&config(vec![source("all.rugby"), source("all.rugby")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_source_needs_units() {
        let mut s = source("all.rugby");
        s.units.clear();
        assert!(validate(&config(vec![s])).is_err());
    }

    #[test]
    fn test_unit_url_scheme() {
        let mut s = source("all.rugby");
        s.units[0].url = "ftp://rugby.example/teams".to_string();
        assert!(validate(&config(vec![s])).is_err());
    }

    #[test]
    fn test_bad_selector_rejected() {
        let mut s = source("all.rugby");
        s.selectors.detail.weight = Some("div[[".to_string());
        assert!(matches!(
            validate(&config(vec![s])),
            Err(ConfigError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_needs_row_or_leaf_selector() {
        let mut s = source("all.rugby");
        s.selectors.leaf_link = None;
        assert!(validate(&config(vec![s])).is_err());
    }

    #[test]
    fn test_retry_bounds() {
        let mut c = config(vec![]);
        c.crawler.max_retries = 11;
        assert!(validate(&c).is_err());
        c.crawler.max_retries = 1;
        assert!(validate(&c).is_ok());
    }

    #[test]
    fn test_split_selector() {
        assert_eq!(split_selector("td a@href"), ("td a", Some("href")));
        assert_eq!(split_selector("img@alt"), ("img", Some("alt")));
        assert_eq!(split_selector("td.name"), ("td.name", None));
        assert_eq!(split_selector("a[href*='@']"), ("a[href*='@']", None));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
