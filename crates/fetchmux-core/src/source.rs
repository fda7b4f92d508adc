use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Canonical provider identifiers used in results, stats and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Hosted document-reader / search API. Quota limited.
    Reader,
    /// Browser-automation crawler driven through a bridge process.
    Crawler,
}

impl ProviderId {
    pub const ALL: [Self; 2] = [Self::Reader, Self::Crawler];

    /// Provider used when selection would otherwise produce an empty chain.
    pub const DEFAULT: Self = Self::Reader;

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Crawler => "crawler",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reader" | "jina" => Ok(Self::Reader),
            "crawler" | "browser" => Ok(Self::Crawler),
            other => Err(ConfigError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}
