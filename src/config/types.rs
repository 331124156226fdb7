use serde::Deserialize;

/// Main configuration structure for Roster-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Attempts per fetch before the URL is recorded as failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// One time unit of exponential backoff (milliseconds)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Timeout of a single fetch attempt (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Courtesy pause after each leaf record (milliseconds)
    #[serde(default = "default_leaf_delay_ms")]
    pub leaf_delay_ms: u64,

    /// Courtesy pause after each group (milliseconds)
    #[serde(default = "default_group_delay_ms")]
    pub group_delay_ms: u64,

    /// Whether each leaf's own page is fetched for enrichment
    #[serde(default = "default_enrich_leaves")]
    pub enrich_leaves: bool,

    /// Skip enrichment of leaves fetched successfully within this many hours (0 disables)
    #[serde(default)]
    pub refetch_window_hours: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_leaf_delay_ms() -> u64 {
    1000
}

fn default_group_delay_ms() -> u64 {
    2000
}

fn default_enrich_leaves() -> bool {
    true
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            leaf_delay_ms: default_leaf_delay_ms(),
            group_delay_ms: default_group_delay_ms(),
            enrich_leaves: default_enrich_leaves(),
            refetch_window_hours: 0,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One source site and the selectors used to read it
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Stable identifier of the origin site, stored on every record
    pub id: String,

    /// Sport or discipline of every record from this source
    pub category: String,

    /// Top-level index pages (federations, countries, leagues)
    pub units: Vec<UnitEntry>,

    pub selectors: SelectorConfig,
}

/// A labelled top-level index page
#[derive(Debug, Clone, Deserialize)]
pub struct UnitEntry {
    pub label: String,
    pub url: String,
}

/// CSS selectors describing a source's markup
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectorConfig {
    /// Links to groups (teams) on an index page
    pub group_link: String,

    /// Rows of inline partial records on a group page
    #[serde(default)]
    pub record_row: Option<String>,

    /// Links to leaf pages on a group page
    #[serde(default)]
    pub leaf_link: Option<String>,

    /// Field selectors applied to each record row
    #[serde(default)]
    pub row: FieldSelectors,

    /// Field selectors applied to a leaf page
    #[serde(default)]
    pub detail: FieldSelectors,
}

/// Per-field selectors; `selector@attr` reads an attribute instead of text
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldSelectors {
    pub name: Option<String>,
    pub link: Option<String>,
    pub age: Option<String>,
    pub birth_date: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub role: Option<String>,
    pub country: Option<String>,
}

impl FieldSelectors {
    /// Iterates over the configured selectors with their field names
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("name", &self.name),
            ("link", &self.link),
            ("age", &self.age),
            ("birth-date", &self.birth_date),
            ("weight", &self.weight),
            ("height", &self.height),
            ("role", &self.role),
            ("country", &self.country),
        ]
        .into_iter()
        .filter_map(|(field, selector)| selector.as_deref().map(|s| (field, s)))
    }
}
