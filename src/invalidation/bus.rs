//! Invalidation Bus
//!
//! Routes mutations through the query cache: run the mutation, and only on
//! success apply its declared invalidation rules.

use std::future::Future;

use tracing::{info, warn};

use crate::cache::QueryCache;
use crate::error::FetchError;
use crate::invalidation::{InvalidationRule, InvalidationScope, MutationKind};

/// Outcome of one invalidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Entries marked stale
    pub marked: usize,
    /// Subscribed entries refetched right after marking
    pub refetched: usize,
}

#[derive(Debug, Clone)]
pub struct InvalidationBus {
    cache: QueryCache,
}

impl InvalidationBus {
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Marks every entry under `prefix` stale, refetching visible ones if
    /// `scope` asks for it.
    pub fn invalidate(&self, prefix: &str, scope: InvalidationScope) -> InvalidationReport {
        self.cache.invalidate(&[InvalidationRule::new(prefix, scope)])
    }

    /// Applies the static rule set of `kind` in one atomic pass.
    ///
    /// `target` fills `{id}` placeholders; it comes from the mutation's
    /// input, never from its response.
    pub fn apply(&self, kind: MutationKind, target: Option<&str>) -> InvalidationReport {
        let rules = kind.resolved_rules(target);
        let report = self.cache.invalidate(&rules);
        info!(
            mutation = %kind,
            target = target.unwrap_or("-"),
            marked = report.marked,
            refetched = report.refetched,
            "Mutation invalidated cached queries"
        );
        report
    }

    /// Runs a mutation and invalidates on success.
    ///
    /// Failures are returned to the caller untouched, are not retried, and
    /// leave the cache as it was.
    pub async fn mutate<T, Fut>(
        &self,
        kind: MutationKind,
        target: Option<&str>,
        mutation: Fut,
    ) -> Result<T, FetchError>
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        match mutation.await {
            Ok(response) => {
                self.apply(kind, target);
                Ok(response)
            }
            Err(err) => {
                warn!(mutation = %kind, error = %err, "Mutation failed; no invalidation applied");
                Err(err)
            }
        }
    }
}
