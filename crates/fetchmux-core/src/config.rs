//! Orchestrator configuration.
//!
//! Loaded from a JSON file and/or overlaid from environment variables, then
//! validated before any request is served.
//!
//! # Environment Variables
//!
//! | Setting | Primary Env Var | Fallback Env Var |
//! |---------|-----------------|------------------|
//! | Reader API key | `FETCHMUX_READER_API_KEY` | `JINA_API_KEY` |
//! | Provider priority | `FETCHMUX_PROVIDERS` (comma list) | - |
//! | Reader / crawler on-off | `FETCHMUX_READER_ENABLED`, `FETCHMUX_CRAWLER_ENABLED` | - |
//! | Crawler bridge | `FETCHMUX_CRAWLER_COMMAND`, `FETCHMUX_CRAWLER_ARGS` | - |
//! | Performance threshold | `FETCHMUX_PERFORMANCE_THRESHOLD` | - |
//! | Budget thresholds | `FETCHMUX_DAILY_BUDGET_THRESHOLD_PCT`, `FETCHMUX_HOURLY_BUDGET_THRESHOLD_PCT` | - |
//! | Budget limits | `FETCHMUX_DAILY_BUDGET_LIMIT`, `FETCHMUX_HOURLY_BUDGET_LIMIT` | - |
//! | Rate ceilings | `FETCHMUX_READ_RPM`, `FETCHMUX_SEARCH_RPM` | - |
//! | Cache TTL | `FETCHMUX_CACHE_TTL_SECS` | - |
//! | Quality comparison | `FETCHMUX_QUALITY_COMPARISON` | - |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BudgetThresholds, ConfigError, ProviderId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub read_base_url: String,
    pub search_base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            read_base_url: String::from("https://r.jina.ai"),
            search_base_url: String::from("https://s.jina.ai"),
            timeout_ms: 30_000,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub enabled: bool,
    /// Program that runs the browser bridge.
    pub command: String,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: String::from("node"),
            args: vec![String::from("crawl-bridge.mjs")],
            timeout_ms: 45_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Provider priority order.
    pub providers: Vec<ProviderId>,
    pub reader: ReaderConfig,
    pub crawler: CrawlerConfig,
    /// Success-rate percentage a provider with history must keep to stay preferred.
    pub performance_threshold: f64,
    pub daily_budget_threshold_pct: f64,
    pub hourly_budget_threshold_pct: f64,
    pub daily_budget_limit: u64,
    pub hourly_budget_limit: u64,
    /// Estimated budget units charged per reader read attempt.
    pub read_cost_units: u64,
    /// Estimated budget units charged per reader search attempt.
    pub search_cost_units: u64,
    pub read_requests_per_minute: u32,
    pub search_requests_per_minute: u32,
    pub cache_ttl_secs: u64,
    pub quality_comparison: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderId::Reader, ProviderId::Crawler],
            reader: ReaderConfig::default(),
            crawler: CrawlerConfig::default(),
            performance_threshold: 75.0,
            daily_budget_threshold_pct: 80.0,
            hourly_budget_threshold_pct: 85.0,
            daily_budget_limit: 1_000_000,
            hourly_budget_limit: 100_000,
            read_cost_units: 1_000,
            search_cost_units: 1_000,
            read_requests_per_minute: 20,
            search_requests_per_minute: 10,
            cache_ttl_secs: 3_600,
            quality_comparison: false,
        }
    }
}

impl FetchConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }

    /// Overlays settings from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlays settings from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("FETCHMUX_READER_API_KEY").or_else(|| lookup("JINA_API_KEY")) {
            self.reader.api_key = Some(key);
        }
        if let Some(list) = lookup("FETCHMUX_PROVIDERS") {
            self.providers = list
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(ProviderId::from_str)
                .collect::<Result<_, _>>()?;
        }
        if let Some(enabled) = parse_bool(&lookup, "FETCHMUX_READER_ENABLED")? {
            self.reader.enabled = enabled;
        }
        if let Some(enabled) = parse_bool(&lookup, "FETCHMUX_CRAWLER_ENABLED")? {
            self.crawler.enabled = enabled;
        }
        if let Some(command) = lookup("FETCHMUX_CRAWLER_COMMAND") {
            self.crawler.command = command;
        }
        if let Some(args) = lookup("FETCHMUX_CRAWLER_ARGS") {
            self.crawler.args = args.split_whitespace().map(str::to_owned).collect();
        }

        overlay(&lookup, "FETCHMUX_PERFORMANCE_THRESHOLD", &mut self.performance_threshold)?;
        overlay(
            &lookup,
            "FETCHMUX_DAILY_BUDGET_THRESHOLD_PCT",
            &mut self.daily_budget_threshold_pct,
        )?;
        overlay(
            &lookup,
            "FETCHMUX_HOURLY_BUDGET_THRESHOLD_PCT",
            &mut self.hourly_budget_threshold_pct,
        )?;
        overlay(&lookup, "FETCHMUX_DAILY_BUDGET_LIMIT", &mut self.daily_budget_limit)?;
        overlay(&lookup, "FETCHMUX_HOURLY_BUDGET_LIMIT", &mut self.hourly_budget_limit)?;
        overlay(&lookup, "FETCHMUX_READ_RPM", &mut self.read_requests_per_minute)?;
        overlay(&lookup, "FETCHMUX_SEARCH_RPM", &mut self.search_requests_per_minute)?;
        overlay(&lookup, "FETCHMUX_CACHE_TTL_SECS", &mut self.cache_ttl_secs)?;
        if let Some(enabled) = parse_bool(&lookup, "FETCHMUX_QUALITY_COMPARISON")? {
            self.quality_comparison = enabled;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, provider) in self.providers.iter().enumerate() {
            if self.providers[..index].contains(provider) {
                return Err(ConfigError::DuplicateProvider {
                    provider: provider.to_string(),
                });
            }
        }
        if self.enabled_providers().is_empty() {
            return Err(ConfigError::NoProvidersEnabled);
        }

        check_percent("performance_threshold", self.performance_threshold)?;
        check_percent("daily_budget_threshold_pct", self.daily_budget_threshold_pct)?;
        check_percent("hourly_budget_threshold_pct", self.hourly_budget_threshold_pct)?;

        check_non_zero("daily_budget_limit", self.daily_budget_limit)?;
        check_non_zero("hourly_budget_limit", self.hourly_budget_limit)?;
        check_non_zero("read_requests_per_minute", u64::from(self.read_requests_per_minute))?;
        check_non_zero("search_requests_per_minute", u64::from(self.search_requests_per_minute))?;

        if self.is_enabled(ProviderId::Reader) {
            check_non_zero("reader.timeout_ms", self.reader.timeout_ms)?;
            check_base_url("reader.read_base_url", &self.reader.read_base_url)?;
            check_base_url("reader.search_base_url", &self.reader.search_base_url)?;
        }
        if self.is_enabled(ProviderId::Crawler) {
            check_non_zero("crawler.timeout_ms", self.crawler.timeout_ms)?;
            if self.crawler.command.trim().is_empty() {
                return Err(ConfigError::EmptyCrawlerCommand);
            }
        }

        Ok(())
    }

    pub fn is_enabled(&self, provider: ProviderId) -> bool {
        match provider {
            ProviderId::Reader => self.reader.enabled,
            ProviderId::Crawler => self.crawler.enabled,
        }
    }

    /// Enabled providers in priority order. Enabled providers missing from
    /// `providers` are appended in canonical order.
    pub fn enabled_providers(&self) -> Vec<ProviderId> {
        let mut ordered = Vec::with_capacity(ProviderId::ALL.len());
        for provider in self.providers.iter().chain(ProviderId::ALL.iter()) {
            if self.is_enabled(*provider) && !ordered.contains(provider) {
                ordered.push(*provider);
            }
        }
        ordered
    }

    pub fn budget_thresholds(&self) -> BudgetThresholds {
        BudgetThresholds {
            daily_pct: self.daily_budget_threshold_pct,
            hourly_pct: self.hourly_budget_threshold_pct,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout_for(&self, provider: ProviderId) -> Duration {
        match provider {
            ProviderId::Reader => Duration::from_millis(self.reader.timeout_ms),
            ProviderId::Crawler => Duration::from_millis(self.crawler.timeout_ms),
        }
    }
}

fn overlay<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnvValue {
                name: name.to_owned(),
                value: raw.clone(),
            })?;
    }
    Ok(())
}

fn parse_bool<F>(lookup: &F, name: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidEnvValue {
            name: name.to_owned(),
            value: raw,
        }),
    }
}

fn check_percent(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::PercentOutOfRange { field, value })
    }
}

fn check_non_zero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroValue { field })
    } else {
        Ok(())
    }
}

fn check_base_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            field,
            value: value.to_owned(),
        }),
    }
}
