use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, UtcOffset};

/// Wall-clock instant pinned to UTC. Result timestamps, `last_used_at` and
/// budget period boundaries all read the clock through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// UTC calendar date, the daily budget period.
    pub fn date(self) -> Date {
        self.0.date()
    }

    /// UTC hour of day, the hourly budget period within [`date`](Self::date).
    pub fn hour(self) -> u8 {
        self.0.hour()
    }
}

/// Any offset is accepted and shifted to UTC.
impl From<OffsetDateTime> for UtcDateTime {
    fn from(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered = self.0.format(&Rfc3339).map_err(|_| std::fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339)
            .map(Self::from)
            .map_err(|error| D::Error::custom(format!("invalid RFC3339 timestamp '{raw}': {error}")))
    }
}
