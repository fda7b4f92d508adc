//! Per-request provider ordering.
//!
//! Priority of signals, highest first:
//! 1. a caller-forced provider ([`SourceStrategy::Force`], [`SourceStrategy::Strict`]);
//! 2. budget pressure on the quota-limited provider;
//! 3. recent success rate against the performance threshold;
//! 4. configured priority order.

use std::collections::HashSet;

use crate::{BudgetState, ProviderId, ProviderStats};

/// Caller preference for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceStrategy {
    /// Let the policy decide.
    #[default]
    Auto,
    /// Soft preference: head of the healthy group, but yields to budget
    /// pressure and to a failing success rate.
    Prefer(ProviderId),
    /// Try this provider first, then fall back to the other enabled ones.
    Force(ProviderId),
    /// Try only this provider.
    Strict(ProviderId),
}

impl SourceStrategy {
    pub fn forced_provider(self) -> Option<ProviderId> {
        match self {
            Self::Force(provider) | Self::Strict(provider) => Some(provider),
            Self::Auto | Self::Prefer(_) => None,
        }
    }

    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict(_))
    }
}

/// An enabled provider as the policy sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub provider: ProviderId,
    pub quota_limited: bool,
    pub stats: ProviderStats,
}

/// Everything one ordering decision depends on.
#[derive(Debug, Clone)]
pub struct SelectionContext<'a> {
    pub strategy: SourceStrategy,
    /// Enabled providers in configured priority order.
    pub candidates: &'a [Candidate],
    pub budget: &'a BudgetState,
}

/// Orders providers for one request. Never returns an empty chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    /// Minimum success rate, in percent, for a provider with history to stay
    /// in the preferred group.
    pub performance_threshold: f64,
    pub default_provider: ProviderId,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            performance_threshold: 75.0,
            default_provider: ProviderId::DEFAULT,
        }
    }
}

impl SelectionPolicy {
    pub fn new(performance_threshold: f64) -> Self {
        Self {
            performance_threshold,
            ..Self::default()
        }
    }

    pub fn order(&self, context: &SelectionContext<'_>) -> Vec<ProviderId> {
        let mut chain = match context.strategy.forced_provider() {
            Some(forced) => {
                let mut chain = vec![forced];
                if !context.strategy.is_strict() {
                    chain.extend(context.candidates.iter().map(|c| c.provider));
                }
                chain
            }
            None if self.under_budget_pressure(context) => {
                let (relief, limited): (Vec<_>, Vec<_>) =
                    context.candidates.iter().partition(|c| !c.quota_limited);
                relief
                    .into_iter()
                    .chain(limited)
                    .map(|c| c.provider)
                    .collect()
            }
            None => self.by_performance(context),
        };

        chain = dedupe_chain(&chain);
        if chain.is_empty() {
            chain.push(self.default_provider);
        }
        chain
    }

    fn under_budget_pressure(&self, context: &SelectionContext<'_>) -> bool {
        let has_limited = context.candidates.iter().any(|c| c.quota_limited);
        let has_relief = context.candidates.iter().any(|c| !c.quota_limited);
        has_limited && has_relief && context.budget.should_prefer_fallback()
    }

    fn by_performance(&self, context: &SelectionContext<'_>) -> Vec<ProviderId> {
        let (mut preferred, demoted): (Vec<_>, Vec<_>) = context
            .candidates
            .iter()
            .partition(|c| self.meets_threshold(&c.stats));

        if let SourceStrategy::Prefer(wanted) = context.strategy {
            if let Some(index) = preferred.iter().position(|c| c.provider == wanted) {
                let candidate = preferred.remove(index);
                preferred.insert(0, candidate);
            }
        }

        preferred
            .into_iter()
            .chain(demoted)
            .map(|c| c.provider)
            .collect()
    }

    fn meets_threshold(&self, stats: &ProviderStats) -> bool {
        !stats.has_history() || stats.success_rate() >= self.performance_threshold
    }
}

fn dedupe_chain(chain: &[ProviderId]) -> Vec<ProviderId> {
    let mut seen = HashSet::new();
    chain
        .iter()
        .copied()
        .filter(|provider| seen.insert(*provider))
        .collect()
}
