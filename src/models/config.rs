//! Application configuration structures.

use std::fs;
use std::path::Path;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// On-disk locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,

    /// CSS selectors for reading forum pages
    #[serde(default)]
    pub selectors: ForumSelectors,

    /// Leaderboard settings
    #[serde(default)]
    pub stats: StatsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.progress_interval == 0 {
            return Err(AppError::validation(
                "crawler.progress_interval must be > 0",
            ));
        }
        url::Url::parse(&self.crawler.forum_url)?;
        url::Url::parse(&self.crawler.login_url)?;
        if self.paths.snapshot_file.trim().is_empty() {
            return Err(AppError::validation("paths.snapshot_file is empty"));
        }
        self.selectors.validate()?;
        for report in &self.stats.reports {
            if !report.include.is_empty() && !report.exclude.is_empty() {
                return Err(AppError::validation(format!(
                    "report '{}' sets both include and exclude",
                    report.title
                )));
            }
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Forum index listing every category
    #[serde(default = "defaults::forum_url")]
    pub forum_url: String,

    /// Login form endpoint
    #[serde(default = "defaults::login_url")]
    pub login_url: String,

    /// Environment variable holding the login name
    #[serde(default = "defaults::username_env")]
    pub username_env: String,

    /// Environment variable holding the password
    #[serde(default = "defaults::password_env")]
    pub password_env: String,

    /// Log crawl progress every N pages
    #[serde(default = "defaults::progress_interval")]
    pub progress_interval: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            forum_url: defaults::forum_url(),
            login_url: defaults::login_url(),
            username_env: defaults::username_env(),
            password_env: defaults::password_env(),
            progress_interval: defaults::progress_interval(),
        }
    }
}

/// File and directory locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one file per fetched page
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: String,

    /// Graph snapshot; its presence skips crawling
    #[serde(default = "defaults::snapshot_file")]
    pub snapshot_file: String,

    /// Plain-text leaderboard output
    #[serde(default = "defaults::report_file")]
    pub report_file: String,

    /// Directory for the HTML leaderboard pages
    #[serde(default = "defaults::html_dir")]
    pub html_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: defaults::cache_dir(),
            snapshot_file: defaults::snapshot_file(),
            report_file: defaults::report_file(),
            html_dir: defaults::html_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// CSS selectors for the forum's listing and topic pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumSelectors {
    /// Category links on the forum index
    #[serde(default = "defaults::category_link")]
    pub category_link: String,

    /// Topic links on a category listing
    #[serde(default = "defaults::topic_link")]
    pub topic_link: String,

    /// Pagination links on any listing or topic page
    #[serde(default = "defaults::pagination_link")]
    pub pagination_link: String,

    /// One element per post on a topic page
    #[serde(default = "defaults::post")]
    pub post: String,

    /// Class marking the opening post of a topic
    #[serde(default = "defaults::first_post_class")]
    pub first_post_class: String,

    /// Post timestamp, relative to the post element
    #[serde(default = "defaults::post_date")]
    pub post_date: String,

    /// Post body, relative to the post element
    #[serde(default = "defaults::post_message")]
    pub post_message: String,

    /// Paragraphs inside the post body
    #[serde(default = "defaults::paragraph")]
    pub paragraph: String,

    /// Author profile link, relative to the post element
    #[serde(default = "defaults::author_link")]
    pub author_link: String,

    /// chrono format of the post timestamp text
    #[serde(default = "defaults::date_format")]
    pub date_format: String,
}

impl ForumSelectors {
    fn validate(&self) -> Result<()> {
        for selector in [
            &self.category_link,
            &self.topic_link,
            &self.pagination_link,
            &self.post,
            &self.post_date,
            &self.post_message,
            &self.paragraph,
            &self.author_link,
        ] {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        if self.first_post_class.trim().is_empty() {
            return Err(AppError::validation("selectors.first_post_class is empty"));
        }
        Ok(())
    }
}

impl Default for ForumSelectors {
    fn default() -> Self {
        Self {
            category_link: defaults::category_link(),
            topic_link: defaults::topic_link(),
            pagination_link: defaults::pagination_link(),
            post: defaults::post(),
            first_post_class: defaults::first_post_class(),
            post_date: defaults::post_date(),
            post_message: defaults::post_message(),
            paragraph: defaults::paragraph(),
            author_link: defaults::author_link(),
            date_format: defaults::date_format(),
        }
    }
}

/// Leaderboard computation and rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Authors and topics need more posts than this for average-based boards
    #[serde(default = "defaults::min_posts")]
    pub min_posts: usize,

    /// Rows printed for author leaderboards
    #[serde(default = "defaults::author_rows")]
    pub author_rows: usize,

    /// Rows printed for topic and word leaderboards
    #[serde(default = "defaults::topic_rows")]
    pub topic_rows: usize,

    /// Words longer than this enter the longest-words board
    #[serde(default = "defaults::long_word_length")]
    pub long_word_length: usize,

    /// One leaderboard set per entry
    #[serde(default = "defaults::reports")]
    pub reports: Vec<ReportConfig>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            min_posts: defaults::min_posts(),
            author_rows: defaults::author_rows(),
            topic_rows: defaults::topic_rows(),
            long_word_length: defaults::long_word_length(),
            reports: defaults::reports(),
        }
    }
}

/// A named category filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportConfig {
    pub title: String,

    /// Only these category titles (takes precedence)
    #[serde(default)]
    pub include: Vec<String>,

    /// All but these category titles
    #[serde(default)]
    pub exclude: Vec<String>,
}

mod defaults {
    use super::ReportConfig;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; forumgraph/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn forum_url() -> String {
        "https://apda.online/forum/".into()
    }
    pub fn login_url() -> String {
        "https://apda.online/wp-login.php?loggedout=true&wp_lang=en_US".into()
    }
    pub fn username_env() -> String {
        "USERNAME".into()
    }
    pub fn password_env() -> String {
        "PASSWORD".into()
    }
    pub fn progress_interval() -> usize {
        50
    }

    // Path defaults
    pub fn cache_dir() -> String {
        "cache".into()
    }
    pub fn snapshot_file() -> String {
        "scraped_data.json".into()
    }
    pub fn report_file() -> String {
        "forum_summary.txt".into()
    }

    pub fn html_dir() -> String {
        "html".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    // Selector defaults
    pub fn category_link() -> String {
        "a.forum-title".into()
    }
    pub fn topic_link() -> String {
        "div.topic-name a".into()
    }
    pub fn pagination_link() -> String {
        "div.pages-and-menu div.pages a[href]".into()
    }
    pub fn post() -> String {
        "div.post-element".into()
    }
    pub fn first_post_class() -> String {
        "first-post".into()
    }
    pub fn post_date() -> String {
        "div.forum-post-date".into()
    }
    pub fn post_message() -> String {
        "div.post-message".into()
    }
    pub fn paragraph() -> String {
        "p".into()
    }
    pub fn author_link() -> String {
        "a.profile-link".into()
    }
    pub fn date_format() -> String {
        "%B %d, %Y, %I:%M %p".into()
    }

    // Stats defaults
    pub fn min_posts() -> usize {
        3
    }
    pub fn author_rows() -> usize {
        25
    }
    pub fn topic_rows() -> usize {
        10
    }
    pub fn long_word_length() -> usize {
        10
    }
    pub fn reports() -> Vec<ReportConfig> {
        vec![
            ReportConfig {
                title: "Forum Leaderboard Including 'Fun & Games'".to_string(),
                include: Vec::new(),
                exclude: Vec::new(),
            },
            ReportConfig {
                title: "Forum Leaderboard Excluding 'Fun & Games'".to_string(),
                include: Vec::new(),
                exclude: vec!["Fun & Games".to_string()],
            },
            ReportConfig {
                title: "Forum Leaderboard for Just 'General Discussion' Category".to_string(),
                include: vec!["General Discussion".to_string()],
                exclude: Vec::new(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.selectors.post = "[[invalid".to_string();
        assert!(matches!(
            config.validate(),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn validate_rejects_include_and_exclude() {
        let mut config = Config::default();
        config.stats.reports.push(ReportConfig {
            title: "both".to_string(),
            include: vec!["A".to_string()],
            exclude: vec!["B".to_string()],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            forum_url = "https://forum.test/"

            [paths]
            snapshot_file = "graph.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.crawler.forum_url, "https://forum.test/");
        assert_eq!(config.crawler.timeout_secs, 30);
        assert_eq!(config.paths.snapshot_file, "graph.json");
        assert_eq!(config.paths.cache_dir, "cache");
        assert_eq!(config.stats.reports.len(), 3);
        assert_eq!(config.paths.html_dir, "html");
    }

    #[test]
    fn load_reads_file_and_reports_missing_one() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("forumgraph.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(matches!(
            Config::load(tmp.path().join("absent.toml")),
            Err(AppError::Io(_))
        ));
    }
}
