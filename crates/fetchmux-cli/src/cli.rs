//! CLI argument definitions for fetchmux.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Fetch one or more documents |
//! | `search` | Run a web search |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | JSON config file, overlaid by `FETCHMUX_*` env vars |
//! | `--provider` | `auto` | Provider to prefer |
//! | `--strict` | `false` | No fallback when a provider is named |
//! | `--no-cache` | `false` | Skip the cache for this run |
//! | `--compare` | `false` | Run a quality comparison read |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--verbose` | `false` | Debug logging on stderr |
//! | `--stats` | `false` | Include provider stats and budget |
//!
//! # Examples
//!
//! ```bash
//! fetchmux fetch https://example.com --pretty
//! fetchmux fetch https://a.test https://b.test --provider crawler --strict
//! fetchmux search "tokio runtime" --limit 5 --stats
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fetchmux_core::{ProviderId, SourceStrategy};

/// Multi-provider document fetching and search.
#[derive(Debug, Parser)]
#[command(
    name = "fetchmux",
    author,
    version,
    about = "Multi-provider document fetching and search",
    long_about = "fetchmux reads web documents and runs searches through a hosted reader API \
and a browser crawler bridge, with caching, rate limiting, budget tracking and automatic \
fallback between providers.\n\
\n\
Use 'fetchmux <command> --help' for command-specific help."
)]
pub struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Provider to try first.
    #[arg(long, global = true, value_enum, default_value_t = ProviderSelector::Auto)]
    pub provider: ProviderSelector,

    /// Do not fall back when `--provider` names a provider.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Neither read from nor write to the cache.
    #[arg(long, global = true, default_value_t = false)]
    pub no_cache: bool,

    /// Also read each document from a second provider to compare quality.
    #[arg(long, global = true, default_value_t = false)]
    pub compare: bool,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Debug logging on stderr. `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Include provider stats and budget usage in the output.
    #[arg(long, global = true, default_value_t = false)]
    pub stats: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderSelector {
    /// Policy-driven order with fallback.
    Auto,
    /// The hosted reader API.
    Reader,
    /// The browser crawler bridge.
    Crawler,
}

impl ProviderSelector {
    pub fn strategy(self, strict: bool) -> SourceStrategy {
        let provider = match self {
            Self::Auto => return SourceStrategy::Auto,
            Self::Reader => ProviderId::Reader,
            Self::Crawler => ProviderId::Crawler,
        };
        if strict {
            SourceStrategy::Strict(provider)
        } else {
            SourceStrategy::Force(provider)
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch documents as clean text.
    ///
    /// # Examples
    ///
    ///   fetchmux fetch https://example.com
    ///   fetchmux fetch https://a.test https://b.test --no-cache
    Fetch(FetchArgs),

    /// Run a web search.
    ///
    /// # Examples
    ///
    ///   fetchmux search "rust async"
    ///   fetchmux search "rust async" --limit 3 --provider crawler
    Search(SearchArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// One or more http(s) URLs.
    #[arg(required = true, num_args = 1..)]
    pub urls: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search query.
    pub query: String,

    /// Maximum number of results.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fetch_with_global_flags() {
        let cli = Cli::try_parse_from([
            "fetchmux",
            "fetch",
            "https://a.test",
            "https://b.test",
            "--provider",
            "crawler",
            "--strict",
            "--no-cache",
        ])
        .expect("valid arguments");

        assert!(cli.strict);
        assert!(cli.no_cache);
        assert_eq!(cli.provider, ProviderSelector::Crawler);
        match cli.command {
            Command::Fetch(args) => assert_eq!(args.urls.len(), 2),
            Command::Search(_) => panic!("expected fetch"),
        }
    }

    #[test]
    fn fetch_requires_a_url() {
        assert!(Cli::try_parse_from(["fetchmux", "fetch"]).is_err());
    }

    #[test]
    fn search_limit_defaults_to_ten() {
        let cli = Cli::try_parse_from(["fetchmux", "search", "rust"]).expect("valid arguments");
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "rust");
                assert_eq!(args.limit, 10);
            }
            Command::Fetch(_) => panic!("expected search"),
        }
    }

    #[test]
    fn selector_maps_to_strategy() {
        assert_eq!(ProviderSelector::Auto.strategy(true), SourceStrategy::Auto);
        assert_eq!(
            ProviderSelector::Reader.strategy(false),
            SourceStrategy::Force(ProviderId::Reader)
        );
        assert_eq!(
            ProviderSelector::Crawler.strategy(true),
            SourceStrategy::Strict(ProviderId::Crawler)
        );
    }
}
