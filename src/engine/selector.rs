//! Market selection.
//!
//! Resolves which new markets a transition activates. Explicit lists are
//! resolved locally and deterministically; select-top-N policies consult
//! the ranking collaborator and fall back to a deterministic ordering
//! when the collaborator fails or returns an invalid or short response.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::{CandidateMarket, MarketPolicy, RetrySettings};
use crate::collaborators::MarketRanker;
use crate::error::CollaboratorError;
use crate::retry::call_with_retry;

/// Deterministic fallback ranking: density descending, id ascending on
/// ties. Pure — identical pools always produce identical output.
#[must_use]
pub fn fallback_ranking(pool: &[CandidateMarket]) -> Vec<String> {
    let mut sorted: Vec<&CandidateMarket> = pool.iter().collect();
    sorted.sort_by(|a, b| {
        b.density
            .total_cmp(&a.density)
            .then_with(|| a.id.cmp(&b.id))
    });
    sorted.into_iter().map(|m| m.id.clone()).collect()
}

/// Filters an untrusted ranked response down to valid entries: members
/// of `pool`, first occurrence only, response order preserved.
#[must_use]
pub fn validate_ranked(response: Vec<String>, pool: &[CandidateMarket]) -> Vec<String> {
    let pool_ids: BTreeSet<&str> = pool.iter().map(|m| m.id.as_str()).collect();
    let mut seen = BTreeSet::new();
    let mut valid = Vec::new();
    for id in response {
        if !pool_ids.contains(id.as_str()) {
            warn!(market = %id, "ranked response entry not in candidate pool; discarded");
            continue;
        }
        if seen.insert(id.clone()) {
            valid.push(id);
        }
    }
    valid
}

/// Resolves market activations for phase transitions.
pub struct MarketSelector {
    ranker: Arc<dyn MarketRanker>,
    retry: RetrySettings,
}

impl MarketSelector {
    /// Creates a selector over the given ranking collaborator.
    #[must_use]
    pub fn new(ranker: Arc<dyn MarketRanker>, retry: RetrySettings) -> Self {
        Self { ranker, retry }
    }

    /// Resolves the markets a transition into a phase with `policy`
    /// should activate, given the currently active set.
    ///
    /// # Errors
    ///
    /// Returns an error only when the candidate directory itself is
    /// unreachable — without a pool there is nothing to fall back on and
    /// the evaluation run gives up for this cycle. Ranking failures are
    /// absorbed by the deterministic fallback.
    pub async fn select(
        &self,
        policy: &MarketPolicy,
        active: &BTreeSet<String>,
    ) -> Result<Vec<String>, CollaboratorError> {
        match policy {
            MarketPolicy::None => Ok(Vec::new()),
            MarketPolicy::Explicit(list) => Ok(Self::select_explicit(list, active)),
            MarketPolicy::SelectTop { count } => self.select_top(*count, active).await,
        }
    }

    /// Explicit list policy: entries not already active, original order,
    /// first occurrence only. No collaborator call.
    #[must_use]
    pub fn select_explicit(list: &[String], active: &BTreeSet<String>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        list.iter()
            .filter(|m| !active.contains(*m) && seen.insert((*m).clone()))
            .cloned()
            .collect()
    }

    async fn select_top(
        &self,
        n: usize,
        active: &BTreeSet<String>,
    ) -> Result<Vec<String>, CollaboratorError> {
        let ranker = Arc::clone(&self.ranker);
        let candidates = call_with_retry(&self.retry, "directory", || {
            let ranker = Arc::clone(&ranker);
            async move { ranker.candidates().await }
        })
        .await?;

        let pool: Vec<CandidateMarket> = candidates
            .into_iter()
            .filter(|m| !active.contains(&m.id))
            .collect();
        if pool.is_empty() {
            debug!("candidate pool exhausted; no markets to activate");
            return Ok(Vec::new());
        }

        let ranker = Arc::clone(&self.ranker);
        let pool_for_call = pool.clone();
        let ranked = call_with_retry(&self.retry, "ranker", move || {
            let ranker = Arc::clone(&ranker);
            let pool = pool_for_call.clone();
            async move { ranker.rank_top(&pool, n).await }
        })
        .await;

        let mut selection = match ranked {
            Ok(response) => {
                let valid = validate_ranked(response, &pool);
                valid.into_iter().take(n).collect()
            }
            Err(err) => {
                warn!(error = %err, "ranking collaborator unavailable; using deterministic fallback");
                Vec::new()
            }
        };

        // Top up short responses from the fallback ordering so the
        // selection is always as large as the pool allows.
        if selection.len() < n {
            let chosen: BTreeSet<&str> = selection.iter().map(String::as_str).collect();
            let fill: Vec<String> = fallback_ranking(&pool)
                .into_iter()
                .filter(|id| !chosen.contains(id.as_str()))
                .take(n - selection.len())
                .collect();
            selection.extend(fill);
        }

        Ok(selection)
    }
}

impl std::fmt::Debug for MarketSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketSelector")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(id: &str, density: f64) -> CandidateMarket {
        CandidateMarket {
            id: id.to_string(),
            population: 100_000,
            density,
            growth_rate: 2.0,
        }
    }

    #[test]
    fn test_fallback_density_descending() {
        let pool = vec![market("a", 1.0), market("b", 3.0), market("c", 2.0)];
        assert_eq!(fallback_ranking(&pool), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_fallback_tie_breaks_by_id() {
        let pool = vec![market("delta", 2.0), market("alpha", 2.0), market("beta", 2.0)];
        assert_eq!(fallback_ranking(&pool), vec!["alpha", "beta", "delta"]);
    }

    #[test]
    fn test_fallback_reproducible() {
        let pool = vec![market("a", 1.5), market("b", 2.5), market("c", 2.5)];
        let first = fallback_ranking(&pool);
        for _ in 0..10 {
            assert_eq!(fallback_ranking(&pool), first);
        }
    }

    #[test]
    fn test_validate_discards_non_members() {
        let pool = vec![market("a", 1.0), market("b", 2.0)];
        let valid = validate_ranked(
            vec!["b".to_string(), "z".to_string(), "a".to_string()],
            &pool,
        );
        assert_eq!(valid, vec!["b", "a"]);
    }

    #[test]
    fn test_validate_discards_duplicates() {
        let pool = vec![market("a", 1.0), market("b", 2.0)];
        let valid = validate_ranked(
            vec!["a".to_string(), "a".to_string(), "b".to_string()],
            &pool,
        );
        assert_eq!(valid, vec!["a", "b"]);
    }

    #[test]
    fn test_explicit_skips_active_keeps_order() {
        let active: BTreeSet<String> = ["b", "d"].iter().map(ToString::to_string).collect();
        let list: Vec<String> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            MarketSelector::select_explicit(&list, &active),
            vec!["a", "c", "e"]
        );
    }

    #[test]
    fn test_explicit_all_active_is_empty() {
        let active: BTreeSet<String> = ["a", "b"].iter().map(ToString::to_string).collect();
        let list: Vec<String> = ["a", "b"].iter().map(ToString::to_string).collect();
        assert!(MarketSelector::select_explicit(&list, &active).is_empty());
    }
}
