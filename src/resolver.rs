// 🏦 Entity Resolver - any identifier → one canonical identity
//
// "Name is a VALUE (can change), the 8-digit code is IDENTITY"
//
// Problem solved:
// - "Bank A", "BANK A", "00000208" → same entity
// - An entity inside a prudential group files consolidated figures under
//   its group leader's code, discovered from the registry
// - Repeated lookups in large batches hit a bounded memo, not the relations

use crate::error::{AnalysisError, AnalysisResult};
use crate::store::{RegistryRow, TabularStore};
use crate::text::{is_entity_code, normalize_name};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

/// Default memo capacity for resolved identifiers and linkages
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

// ============================================================================
// RESOLVED ENTITY
// ============================================================================

/// Every identifier the retrieval layer needs, resolved once.
///
/// Immutable: produced by the resolver, shared by providers and batches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedEntity {
    /// 8-digit code of the entity itself
    pub own_code: String,

    /// Code its figures are filed under (group leader, or itself)
    pub reporting_code: String,

    /// Prudential group from the most recent registry record
    pub parent_group_code: Option<String>,

    /// Financial group from the most recent registry record
    pub financial_group_code: Option<String>,

    /// Name from the most recent registry record
    pub canonical_name: Option<String>,

    /// What the caller typed, kept for messages
    pub original_identifier: String,
}

impl ResolvedEntity {
    /// Canonical name, falling back to the identifier the caller used
    pub fn display_name(&self) -> &str {
        self.canonical_name
            .as_deref()
            .unwrap_or(&self.original_identifier)
    }

    /// True when figures are filed under another entity's code
    pub fn reports_through_leader(&self) -> bool {
        self.reporting_code != self.own_code
    }
}

/// Registry linkage of one entity code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linkage {
    pub reporting_code: String,
    pub parent_group_code: Option<String>,
    pub financial_group_code: Option<String>,
    pub canonical_name: Option<String>,
}

impl Linkage {
    fn self_reporting(code: &str) -> Self {
        Linkage {
            reporting_code: code.to_string(),
            parent_group_code: None,
            financial_group_code: None,
            canonical_name: None,
        }
    }
}

// ============================================================================
// NAME INDEX
// ============================================================================

#[derive(Debug, Clone)]
struct IndexEntry {
    key: String,
    display: String,
    code: String,
}

/// Normalized name → code, first-seen-wins.
///
/// Sources are scanned in priority order: registry, group-level detail,
/// entity-level detail. Never mutated after construction.
#[derive(Debug, Default)]
pub struct NameIndex {
    entries: Vec<IndexEntry>,
    by_key: HashMap<String, usize>,
}

impl NameIndex {
    pub fn build(store: &TabularStore) -> Self {
        let mut index = NameIndex::default();

        let registry = store
            .registry
            .iter()
            .map(|r| (&r.institution_name, &r.entity_code));
        let group = store
            .group_detail
            .iter()
            .map(|r| (&r.institution_name, &r.entity_code));
        let entity = store
            .entity_detail
            .iter()
            .map(|r| (&r.institution_name, &r.entity_code));

        for (name, code) in registry.chain(group).chain(entity) {
            index.insert(name, code);
        }

        tracing::debug!(names = index.len(), "name index built");
        index
    }

    fn insert(&mut self, name: &str, code: &str) {
        let key = normalize_name(name);
        if key.is_empty() || code.is_empty() || self.by_key.contains_key(&key) {
            return;
        }

        self.by_key.insert(key.clone(), self.entries.len());
        self.entries.push(IndexEntry {
            key,
            display: name.trim().to_string(),
            code: code.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn exact(&self, key: &str) -> Option<&IndexEntry> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    fn containing(&self, fragment: &str) -> Vec<&IndexEntry> {
        self.entries
            .iter()
            .filter(|e| e.key.contains(fragment))
            .collect()
    }
}

// ============================================================================
// ENTITY RESOLVER
// ============================================================================

/// Resolves identifiers against one immutable store snapshot.
///
/// `resolve` takes `&self`; `invalidate` and `replace_store` take `&mut self`,
/// so a reload can never overlap an in-flight resolution.
pub struct EntityResolver {
    store: Arc<TabularStore>,
    index: OnceLock<NameIndex>,
    resolved: Mutex<LruCache<String, ResolvedEntity>>,
    linkages: Mutex<LruCache<String, Linkage>>,
}

impl EntityResolver {
    pub fn new(store: Arc<TabularStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(store: Arc<TabularStore>, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        let resolver = EntityResolver {
            store,
            index: OnceLock::new(),
            resolved: Mutex::new(LruCache::new(cap)),
            linkages: Mutex::new(LruCache::new(cap)),
        };

        // Built eagerly at startup; only invalidate() makes it lazy again
        resolver.index();
        resolver
    }

    pub fn store(&self) -> &Arc<TabularStore> {
        &self.store
    }

    fn index(&self) -> &NameIndex {
        self.index.get_or_init(|| NameIndex::build(&self.store))
    }

    /// Number of distinct names in the index
    pub fn index_len(&self) -> usize {
        self.index().len()
    }

    /// Number of memoized resolutions
    pub fn cached_len(&self) -> usize {
        self.resolved.lock().len()
    }

    /// Find the 8-digit code for a name or code.
    ///
    /// An 8-digit identifier is returned as-is. Otherwise: exact match on the
    /// normalized name, then substring containment, which must be unique.
    pub fn find_code(&self, identifier: &str) -> AnalysisResult<String> {
        if is_entity_code(identifier) {
            return Ok(identifier.to_string());
        }

        let key = normalize_name(identifier);
        if key.is_empty() {
            return Err(AnalysisError::not_found(identifier));
        }

        let index = self.index();
        if let Some(entry) = index.exact(&key) {
            return Ok(entry.code.clone());
        }

        let matches = index.containing(&key);
        match matches.as_slice() {
            [] => Err(AnalysisError::not_found(identifier)),
            [single] => Ok(single.code.clone()),
            many => Err(AnalysisError::ambiguous(
                identifier,
                many.iter().map(|e| e.display.clone()).collect(),
            )),
        }
    }

    /// Registry linkage for a code: reporting code, parent group, canonical name
    pub fn get_linkage(&self, code: &str) -> Linkage {
        if let Some(hit) = self.linkages.lock().get(code) {
            return hit.clone();
        }

        let linkage = self.compute_linkage(code);
        self.linkages.lock().put(code.to_string(), linkage.clone());
        linkage
    }

    fn compute_linkage(&self, code: &str) -> Linkage {
        let latest = match self.store.latest_registry_row(code) {
            Some(row) => row,
            None => return Linkage::self_reporting(code),
        };

        let mut linkage = Linkage {
            reporting_code: code.to_string(),
            parent_group_code: latest.prudential_group_code.clone(),
            financial_group_code: latest.financial_group_code.clone(),
            canonical_name: Some(latest.institution_name.clone()).filter(|n| !n.is_empty()),
        };

        if let Some(group) = &linkage.parent_group_code {
            if let Some(leader) = self
                .store
                .latest_group_leader(group)
                .and_then(|row| row.leader_code.clone())
            {
                linkage.reporting_code = leader;
            }
        }

        linkage
    }

    /// Full resolution in one step, memoized by identifier.
    ///
    /// Failures are not memoized.
    pub fn resolve(&self, identifier: &str) -> AnalysisResult<ResolvedEntity> {
        if let Some(hit) = self.resolved.lock().get(identifier) {
            return Ok(hit.clone());
        }

        let own_code = self.find_code(identifier)?;
        let linkage = self.get_linkage(&own_code);

        let entity = ResolvedEntity {
            reporting_code: linkage.reporting_code,
            parent_group_code: linkage.parent_group_code,
            financial_group_code: linkage.financial_group_code,
            canonical_name: linkage.canonical_name,
            own_code,
            original_identifier: identifier.to_string(),
        };

        self.resolved
            .lock()
            .put(identifier.to_string(), entity.clone());
        Ok(entity)
    }

    /// Most recent registry record for an entity code
    pub fn latest_registry_row(&self, code: &str) -> Option<&RegistryRow> {
        self.store.latest_registry_row(code)
    }

    /// Drop memoized resolutions and force the index to be rebuilt on next use
    pub fn invalidate(&mut self) {
        self.resolved.get_mut().clear();
        self.linkages.get_mut().clear();
        self.index.take();
        tracing::debug!("resolver caches invalidated");
    }

    /// Swap in a freshly loaded snapshot
    pub fn replace_store(&mut self, store: Arc<TabularStore>) {
        self.store = store;
        self.invalidate();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::{registry, sample_store};

    fn resolver() -> EntityResolver {
        EntityResolver::new(Arc::new(sample_store()))
    }

    #[test]
    fn test_find_code_passes_codes_through() {
        let empty = EntityResolver::new(Arc::new(TabularStore::default()));
        // Not in any relation, still accepted verbatim
        assert_eq!(empty.find_code("00000208").unwrap(), "00000208");
        assert_eq!(empty.find_code("99999999").unwrap(), "99999999");
    }

    #[test]
    fn test_find_code_exact_match_case_insensitive() {
        let r = resolver();
        assert_eq!(r.find_code("bank a").unwrap(), "00000208");
        assert_eq!(r.find_code("  Bank X  ").unwrap(), "00000400");
    }

    #[test]
    fn test_find_code_unique_containment() {
        let r = resolver();
        assert_eq!(r.find_code("ORPHAN").unwrap(), "00000500");
        assert_eq!(r.find_code("securities").unwrap(), "00000401");
    }

    #[test]
    fn test_find_code_ambiguous_lists_all_matches() {
        let r = resolver();
        match r.find_code("BANK") {
            Err(AnalysisError::Ambiguous { matches, .. }) => {
                assert!(matches.len() >= 5);
                assert!(matches.contains(&"BANK A".to_string()));
                assert!(matches.contains(&"BANK X SECURITIES".to_string()));
                assert!(matches.contains(&"ORPHAN BANK".to_string()));
            }
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_find_code_not_found() {
        let r = resolver();
        assert!(matches!(
            r.find_code("NoSuchBank"),
            Err(AnalysisError::NotFound { .. })
        ));
        assert!(matches!(r.find_code("   "), Err(AnalysisError::NotFound { .. })));
    }

    #[test]
    fn test_registry_name_wins_over_detail_name() {
        let mut store = TabularStore::default();
        store
            .registry
            .push(registry("00000001", 202501, "SHARED NAME", None, None, None));
        store.entity_detail.push(crate::store::fixtures::detail(
            "00000002", 202501, "Total Assets", 1, 4010, 1.0, "Shared Name",
        ));

        let r = EntityResolver::new(Arc::new(store));
        assert_eq!(r.find_code("shared name").unwrap(), "00000001");
        assert_eq!(r.index_len(), 1);
    }

    #[test]
    fn test_resolve_uses_group_leader_as_reporting_code() {
        let r = resolver();
        let a = r.resolve("BANK A").unwrap();

        assert_eq!(a.own_code, "00000208");
        assert_eq!(a.reporting_code, "00000300");
        assert_eq!(a.parent_group_code.as_deref(), Some("C001"));
        assert_eq!(a.canonical_name.as_deref(), Some("BANK A"));
        assert!(a.reports_through_leader());
    }

    #[test]
    fn test_resolve_without_registry_row_self_reports() {
        let r = resolver();
        let orphan = r.resolve("00000500").unwrap();

        assert_eq!(orphan.reporting_code, "00000500");
        assert_eq!(orphan.parent_group_code, None);
        assert_eq!(orphan.canonical_name, None);
        assert_eq!(orphan.display_name(), "00000500");
    }

    #[test]
    fn test_group_without_declared_leader_falls_back_to_own_code() {
        let mut store = TabularStore::default();
        store
            .registry
            .push(registry("00000010", 202501, "LONE MEMBER", Some("C777"), None, None));

        let r = EntityResolver::new(Arc::new(store));
        let e = r.resolve("00000010").unwrap();
        assert_eq!(e.reporting_code, "00000010");
        assert_eq!(e.parent_group_code.as_deref(), Some("C777"));
    }

    #[test]
    fn test_most_recent_leader_wins() {
        let mut store = TabularStore::default();
        store.registry.extend([
            registry("00000020", 202501, "MEMBER", Some("C9"), None, None),
            registry("00000030", 202406, "OLD LEADER", Some("C9"), None, Some("00000030")),
            registry("00000040", 202412, "NEW LEADER", Some("C9"), None, Some("00000040")),
        ]);

        let r = EntityResolver::new(Arc::new(store));
        assert_eq!(r.resolve("MEMBER").unwrap().reporting_code, "00000040");
    }

    #[test]
    fn test_resolve_is_memoized_and_bounded() {
        let r = EntityResolver::with_capacity(Arc::new(sample_store()), 2);

        r.resolve("00000208").unwrap();
        r.resolve("00000300").unwrap();
        r.resolve("00000400").unwrap();
        assert_eq!(r.cached_len(), 2);

        // Failures are not cached
        assert!(r.resolve("NoSuchBank").is_err());
        assert_eq!(r.cached_len(), 2);
    }

    #[test]
    fn test_replace_store_rebuilds_index_and_clears_memo() {
        let mut r = resolver();
        assert_eq!(r.resolve("BANK A").unwrap().own_code, "00000208");

        let mut renamed = TabularStore::default();
        renamed
            .registry
            .push(registry("00000999", 202501, "BANK A", None, None, None));
        r.replace_store(Arc::new(renamed));

        assert_eq!(r.cached_len(), 0);
        let fresh = r.resolve("BANK A").unwrap();
        assert_eq!(fresh.own_code, "00000999");
        assert_eq!(r.index_len(), 1);
    }
}
