//! Ordered-fallback query execution.
//!
//! No single query surface reliably exposes every metadata category, so
//! each category carries an ordered list of strategies ranked by how much
//! they return when they work. The executor tries them strictly in order
//! and stops at the first non-empty result; a later strategy is never
//! attempted once an earlier one produced rows. Adding or reordering a
//! strategy is a data change in the owning fetcher, not a control-flow
//! change here.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::error::TransportError;
use crate::transport::OrgClient;

/// One (query shape, API surface) combination.
#[derive(Debug, Clone, Copy)]
pub struct QueryStrategy {
    pub label: &'static str,
    pub soql: &'static str,
    pub tooling: bool,
}

#[derive(Debug)]
pub enum CascadeOutcome<T> {
    /// A strategy returned rows; later strategies were not attempted.
    Hit {
        strategy: &'static str,
        records: Vec<T>,
    },
    /// At least one strategy answered, but none had rows.
    Empty,
    /// Every strategy errored or timed out.
    Unavailable { note: String },
}

/// Try `strategies` in order, each attempt bounded by the configured
/// deadline. Timeouts and non-auth errors fall through to the next
/// strategy; auth errors are category-fatal and propagate immediately.
pub async fn run_cascade<T: DeserializeOwned>(
    client: &OrgClient,
    what: &str,
    strategies: &[QueryStrategy],
) -> Result<CascadeOutcome<T>, TransportError> {
    let attempt_timeout = Duration::from_millis(CONFIG.attempt_timeout_ms);
    let mut errors: Vec<String> = Vec::new();
    let mut answered_empty = false;

    for strategy in strategies {
        let attempt = client.query_all::<T>(strategy.soql, strategy.tooling);
        match tokio::time::timeout(attempt_timeout, attempt).await {
            Ok(Ok(records)) if !records.is_empty() => {
                debug!(
                    "{}: strategy '{}' returned {} records",
                    what,
                    strategy.label,
                    records.len()
                );
                return Ok(CascadeOutcome::Hit {
                    strategy: strategy.label,
                    records,
                });
            }
            Ok(Ok(_)) => {
                debug!("{}: strategy '{}' returned no rows", what, strategy.label);
                answered_empty = true;
            }
            Ok(Err(e)) if e.is_auth() => return Err(e),
            Ok(Err(e)) => {
                debug!("{}: strategy '{}' failed: {}", what, strategy.label, e);
                errors.push(format!("{}: {}", strategy.label, e));
            }
            Err(_) => {
                warn!(
                    "{}: strategy '{}' timed out after {:?}",
                    what, strategy.label, attempt_timeout
                );
                errors.push(format!("{}: timed out", strategy.label));
            }
        }
    }

    if answered_empty {
        return Ok(CascadeOutcome::Empty);
    }
    Ok(CascadeOutcome::Unavailable {
        note: unavailable_note(what, &errors),
    })
}

/// The `{total, active}` aggregate pair, fetched through two independent
/// `COUNT()` queries running concurrently. Used for categories whose
/// detail queries are unreliable but whose aggregates are not; fetched
/// before, and regardless of, any detail attempt. Each side degrades to
/// `None` on its own failure.
pub async fn count_pair(
    client: &OrgClient,
    what: &str,
    total_soql: &str,
    active_soql: &str,
    tooling: bool,
) -> Result<(Option<u32>, Option<u32>), TransportError> {
    let (total_result, active_result) = tokio::join!(
        client.count(total_soql, tooling),
        client.count(active_soql, tooling)
    );

    let total = match total_result {
        Ok(n) => Some(n),
        Err(e) if e.is_auth() => return Err(e),
        Err(e) => {
            debug!("{}: total count failed: {}", what, e);
            None
        }
    };
    let active = match active_result {
        Ok(n) => Some(n),
        Err(e) if e.is_auth() => return Err(e),
        Err(e) => {
            debug!("{}: active count failed: {}", what, e);
            None
        }
    };

    Ok((total, active))
}

/// Human-readable reason for an all-strategies-failed category, built
/// from the trailing errors.
fn unavailable_note(what: &str, errors: &[String]) -> String {
    if errors.is_empty() {
        return format!("{what} could not be retrieved");
    }
    let tail = errors
        .iter()
        .rev()
        .take(2)
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");
    format!("{what} could not be retrieved ({tail})")
}
