//! In-memory store for grants.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use warden_core::{Action, Scope, Timestamp};

use super::{Grant, GrantDuration, GrantId, GrantRequest};
use crate::error::{ApprovalError, ApprovalResult};

/// Default upper bound on cached grants.
pub const DEFAULT_CAPACITY: usize = 1000;

/// What a lookup is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantQuery<'a> {
    /// Scope of the operation.
    pub scope: Scope,
    /// Action of the operation.
    pub action: Action,
    /// Resource being touched.
    pub resource: Option<&'a str>,
    /// Caller context.
    pub context: Option<&'a str>,
}

impl<'a> GrantQuery<'a> {
    /// Query for `scope`/`action` with no resource or context.
    #[must_use]
    pub fn new(scope: Scope, action: Action) -> Self {
        Self {
            scope,
            action,
            resource: None,
            context: None,
        }
    }

    /// Set the resource.
    #[must_use]
    pub fn resource(mut self, resource: Option<&'a str>) -> Self {
        self.resource = resource;
        self
    }

    /// Set the context.
    #[must_use]
    pub fn context(mut self, context: Option<&'a str>) -> Self {
        self.context = context;
        self
    }
}

/// Result of [`GrantStore::find_and_use`].
#[derive(Debug, Clone, Default)]
pub struct GrantLookup {
    /// The grant that answered, after its usage was recorded.
    pub hit: Option<Grant>,
    /// Expired grants evicted while the lock was held.
    pub expired: Vec<Grant>,
}

/// Usage statistics for the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantStats {
    /// Grants currently cached.
    pub total: usize,
    /// Grants in the granted state.
    pub granted: usize,
    /// Grants in the denied state.
    pub denied: usize,
    /// Grants that would be written to disk.
    pub persistent: usize,
    /// Grant count per scope.
    pub by_scope: BTreeMap<String, usize>,
    /// Sum of usage counts.
    pub total_usage: u64,
}

/// A grant plus its compiled resource pattern.
struct Entry {
    grant: Grant,
    pattern: Option<Regex>,
}

impl Entry {
    fn new(grant: Grant) -> ApprovalResult<Self> {
        let pattern = grant
            .resource_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| ApprovalError::InvalidRule {
                    pattern: p.to_owned(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self { grant, pattern })
    }

    fn matches(&self, query: &GrantQuery<'_>, contextual: bool) -> bool {
        let g = &self.grant;
        if g.scope != query.scope || g.action != query.action {
            return false;
        }
        if let Some(re) = &self.pattern {
            if !query.resource.is_some_and(|r| re.is_match(r)) {
                return false;
            }
        } else if let Some(literal) = &g.resource
            && query.resource != Some(literal.as_str())
        {
            return false;
        }
        if contextual
            && let Some(ctx) = &g.context
            && query.context != Some(ctx.as_str())
        {
            return false;
        }
        true
    }
}

/// In-memory store for grants.
///
/// Thread-safe via internal [`RwLock`]. Every mutation of a grant, including
/// the usage bump on a cache hit, happens under the write lock, so a grant
/// written by one caller is visible to the next lookup.
///
/// # Example
///
/// ```
/// use warden_approval::{GrantQuery, GrantRequest, GrantState, GrantStore};
/// use warden_core::{Action, Scope};
///
/// let store = GrantStore::new();
/// store
///     .grant(GrantRequest::new(Scope::File, Action::Read, GrantState::Granted).with_resource("/tmp/a"))
///     .unwrap();
///
/// let query = GrantQuery::new(Scope::File, Action::Read).resource(Some("/tmp/a"));
/// assert!(store.find_and_use(&query).hit.is_some());
/// ```
pub struct GrantStore {
    grants: RwLock<HashMap<GrantId, Entry>>,
    contextual: AtomicBool,
    capacity: AtomicUsize,
}

impl GrantStore {
    /// Create an empty store with contextual matching on and the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(true, DEFAULT_CAPACITY)
    }

    /// Create an empty store with explicit limits.
    #[must_use]
    pub fn with_limits(contextual: bool, capacity: usize) -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
            contextual: AtomicBool::new(contextual),
            capacity: AtomicUsize::new(capacity.max(1)),
        }
    }

    /// Change matching and capacity limits. Shrinking evicts immediately.
    pub fn set_limits(&self, contextual: bool, capacity: usize) {
        self.contextual.store(contextual, Ordering::Relaxed);
        self.capacity.store(capacity.max(1), Ordering::Relaxed);
        let mut map = self.write();
        self.enforce_capacity(&mut map, None);
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<GrantId, Entry>> {
        self.grants.read().unwrap_or_else(|e| {
            warn!("GrantStore read lock poisoned, recovering");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<GrantId, Entry>> {
        self.grants.write().unwrap_or_else(|e| {
            warn!("GrantStore lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Create a grant.
    ///
    /// An existing grant with the same scope, action, resource, pattern, and
    /// context is replaced. If the store is over capacity afterwards, the
    /// least recently used other grant is evicted.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRule`] if the resource pattern is not a
    /// valid regex.
    pub fn grant(&self, request: GrantRequest) -> ApprovalResult<Grant> {
        let entry = Entry::new(request.into_grant())?;
        let grant = entry.grant.clone();

        let mut map = self.write();
        let before = map.len();
        map.retain(|_, e| !e.grant.same_key(&grant));
        if map.len() < before {
            debug!(scope = %grant.scope, action = %grant.action, "replaced grant with identical key");
        }
        map.insert(grant.id.clone(), entry);
        self.enforce_capacity(&mut map, Some(&grant.id));

        info!(
            id = %grant.id,
            scope = %grant.scope,
            action = %grant.action,
            resource = grant.resource.as_deref().unwrap_or("*"),
            state = %grant.state,
            duration = %grant.duration,
            granted_by = %grant.granted_by,
            "stored grant"
        );
        Ok(grant)
    }

    fn enforce_capacity(&self, map: &mut HashMap<GrantId, Entry>, keep: Option<&GrantId>) {
        let capacity = self.capacity.load(Ordering::Relaxed);
        while map.len() > capacity {
            let victim = map
                .values()
                .filter(|e| Some(&e.grant.id) != keep)
                .min_by_key(|e| e.grant.recency())
                .map(|e| e.grant.id.clone());
            let Some(id) = victim else { break };
            map.remove(&id);
            debug!(id = %id, capacity, "evicted least recently used grant");
        }
    }

    fn best_match<'m>(
        map: &'m HashMap<GrantId, Entry>,
        query: &GrantQuery<'_>,
        contextual: bool,
    ) -> Option<&'m Grant> {
        map.values()
            .filter(|e| !e.grant.is_expired() && e.matches(query, contextual))
            .map(|e| &e.grant)
            .max_by(|a, b| {
                a.specificity()
                    .cmp(&b.specificity())
                    .then(a.granted_at.cmp(&b.granted_at))
            })
    }

    /// Find the most specific matching grant and record a use.
    ///
    /// Literal-resource grants beat pattern grants, which beat scope-wide
    /// grants; ties go to the most recent. A `once` grant is removed by the
    /// use. Expired grants are evicted while the lock is held and returned
    /// so the caller can audit them.
    #[must_use]
    pub fn find_and_use(&self, query: &GrantQuery<'_>) -> GrantLookup {
        let contextual = self.contextual.load(Ordering::Relaxed);
        let mut map = self.write();

        let expired = Self::take_expired(&mut map);

        let Some(id) = Self::best_match(&map, query, contextual).map(|g| g.id.clone()) else {
            return GrantLookup { hit: None, expired };
        };

        let consumed = map
            .get(&id)
            .is_some_and(|e| e.grant.duration == GrantDuration::Once);
        let hit = if consumed {
            map.remove(&id).map(|mut e| {
                record_use(&mut e.grant);
                debug!(id = %id, "consumed once grant");
                e.grant
            })
        } else {
            map.get_mut(&id).map(|e| {
                record_use(&mut e.grant);
                e.grant.clone()
            })
        };

        GrantLookup { hit, expired }
    }

    /// Find the most specific matching grant without recording a use.
    #[must_use]
    pub fn find_matching(&self, query: &GrantQuery<'_>) -> Option<Grant> {
        let contextual = self.contextual.load(Ordering::Relaxed);
        let map = self.read();
        Self::best_match(&map, query, contextual).cloned()
    }

    fn take_expired(map: &mut HashMap<GrantId, Entry>) -> Vec<Grant> {
        let ids: Vec<GrantId> = map
            .values()
            .filter(|e| e.grant.is_expired())
            .map(|e| e.grant.id.clone())
            .collect();
        ids.iter()
            .filter_map(|id| map.remove(id))
            .map(|e| e.grant)
            .collect()
    }

    fn remove_where(&self, pred: impl Fn(&Grant) -> bool) -> Vec<Grant> {
        let mut map = self.write();
        let ids: Vec<GrantId> = map
            .values()
            .filter(|e| pred(&e.grant))
            .map(|e| e.grant.id.clone())
            .collect();
        ids.iter()
            .filter_map(|id| map.remove(id))
            .map(|e| e.grant)
            .collect()
    }

    /// Remove every expired grant.
    #[must_use]
    pub fn sweep_expired(&self) -> Vec<Grant> {
        let mut map = self.write();
        Self::take_expired(&mut map)
    }

    /// Remove one grant.
    #[must_use]
    pub fn revoke(&self, id: &GrantId) -> Option<Grant> {
        self.write().remove(id).map(|e| e.grant)
    }

    /// Remove every grant for `scope`.
    #[must_use]
    pub fn revoke_by_scope(&self, scope: Scope) -> Vec<Grant> {
        self.remove_where(|g| g.scope == scope)
    }

    /// Remove every grant recorded for `tool_name`.
    #[must_use]
    pub fn revoke_by_tool(&self, tool_name: &str) -> Vec<Grant> {
        self.remove_where(|g| g.tool_name.as_deref() == Some(tool_name))
    }

    /// Remove session and once grants, keeping the durable ones.
    #[must_use]
    pub fn clear_session(&self) -> Vec<Grant> {
        self.remove_where(|g| !g.duration.is_persistent())
    }

    /// Remove everything.
    #[must_use]
    pub fn clear_all(&self) -> Vec<Grant> {
        self.remove_where(|_| true)
    }

    /// Look up a grant by id.
    #[must_use]
    pub fn get(&self, id: &GrantId) -> Option<Grant> {
        self.read().get(id).map(|e| e.grant.clone())
    }

    /// Every grant, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Grant> {
        let mut grants: Vec<Grant> = self.read().values().map(|e| e.grant.clone()).collect();
        grants.sort_by_key(|g| g.granted_at);
        grants
    }

    /// Number of cached grants.
    #[must_use]
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Durable, unexpired grants, oldest first. Session and once grants are
    /// never included.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Grant> {
        let mut grants: Vec<Grant> = self
            .read()
            .values()
            .map(|e| &e.grant)
            .filter(|g| g.duration.is_persistent() && !g.is_expired())
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.granted_at);
        grants
    }

    /// Insert grants loaded from disk, keeping their ids and timestamps.
    ///
    /// Session, once, and expired grants are dropped, as are grants whose
    /// pattern no longer compiles. Returns the number inserted.
    pub fn restore(&self, grants: Vec<Grant>) -> usize {
        let mut map = self.write();
        let mut inserted: usize = 0;
        for grant in grants {
            if !grant.duration.is_persistent() || grant.is_expired() {
                continue;
            }
            match Entry::new(grant) {
                Ok(entry) => {
                    map.retain(|_, e| !e.grant.same_key(&entry.grant));
                    map.insert(entry.grant.id.clone(), entry);
                    inserted = inserted.saturating_add(1);
                },
                Err(e) => warn!(error = %e, "dropping persisted grant with invalid pattern"),
            }
        }
        self.enforce_capacity(&mut map, None);
        inserted
    }

    /// Usage statistics.
    #[must_use]
    pub fn stats(&self) -> GrantStats {
        let map = self.read();
        let mut stats = GrantStats {
            total: map.len(),
            ..GrantStats::default()
        };
        for grant in map.values().map(|e| &e.grant) {
            if grant.is_granted() {
                stats.granted = stats.granted.saturating_add(1);
            } else {
                stats.denied = stats.denied.saturating_add(1);
            }
            if grant.duration.is_persistent() {
                stats.persistent = stats.persistent.saturating_add(1);
            }
            let slot = stats.by_scope.entry(grant.scope.to_string()).or_insert(0);
            *slot = slot.saturating_add(1);
            stats.total_usage = stats.total_usage.saturating_add(grant.usage_count);
        }
        stats
    }
}

fn record_use(grant: &mut Grant) {
    grant.usage_count = grant.usage_count.saturating_add(1);
    grant.last_used = Some(Timestamp::now());
}

impl Default for GrantStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantStore")
            .field("count", &self.count())
            .field("contextual", &self.contextual.load(Ordering::Relaxed))
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
