//! Central [`PanelState`] container for the package panel.
//!
//! This is the reconciliation state: the remotely fetched catalog, the search
//! view over it, and the locally pending set of user-requested changes. All
//! mutation goes through `crate::logic` and `crate::panel`; the struct itself
//! only offers read-side projections.

use std::collections::BTreeMap;

use crate::state::types::{EnvironmentRef, Package, PendingEntry, PkgFilter, PkgSelection};

/// Reconciliation state owned by the package panel.
///
/// Mutated in response to user intents and background fetch completions.
/// `catalog` and `search_results` are mutually exclusive display sources:
/// while `search_term` is non-empty the search results are shown, otherwise
/// the catalog is.
#[derive(Clone, Debug, Default)]
pub struct PanelState {
    /// Environment the catalog and pending set belong to. Pending changes
    /// never carry across environments.
    pub environment: Option<EnvironmentRef>,
    /// All packages loaded for the active environment, replaced wholesale on
    /// refresh.
    pub catalog: Vec<Package>,
    /// Whether the catalog has further pages to load incrementally.
    pub catalog_has_more: bool,
    /// Next page to request when the bottom of the catalog list is reached.
    pub next_catalog_page: u64,
    /// Packages matching the last committed search term.
    pub search_results: Vec<Package>,
    /// Current search input text. Non-empty means search results are the
    /// display source.
    pub search_term: String,
    /// Uncommitted user intent, keyed by package name. Presence always means
    /// "differs from the last synced install state".
    pub pending: BTreeMap<String, PendingEntry>,
    /// Active view filter.
    pub active_filter: PkgFilter,
    /// Catalog refresh in flight.
    pub is_loading: bool,
    /// Search fetch in flight for a changed term.
    pub is_loading_search: bool,
    /// Mutual-exclusion flag held for the duration of apply/update-all.
    /// Every user-initiated mutating intent no-ops while set.
    pub is_applying_changes: bool,
    /// At least one catalog package is updatable.
    pub has_update: bool,
    /// Monotonic id for the next search query.
    pub next_query_id: u64,
    /// Id of the most recently issued search query; responses carrying an
    /// older id are stale and must be discarded.
    pub latest_query_id: u64,
}

impl PanelState {
    /// Return the effective selection for a package: the pending entry when
    /// present, otherwise the installed version (installed packages) or the
    /// unselected sentinel (not installed).
    ///
    /// Inputs:
    /// - `pkg`: Package to resolve
    ///
    /// Output: The [`PkgSelection`] a list row should display.
    #[must_use]
    pub fn effective_selection(&self, pkg: &Package) -> PkgSelection {
        if let Some(entry) = self.pending.get(&pkg.name) {
            return entry.selection.clone();
        }
        match &pkg.version_installed {
            Some(v) => PkgSelection::Pin(v.clone()),
            None => PkgSelection::Remove,
        }
    }

    /// Return the list currently acting as display source.
    ///
    /// While a non-empty search term is loading, the displayed list is empty
    /// rather than stale results for the previous term.
    #[must_use]
    pub fn display_source(&self) -> &[Package] {
        if self.search_term.is_empty() {
            &self.catalog
        } else if self.is_loading_search {
            &[]
        } else {
            &self.search_results
        }
    }

    /// Drop all state tied to the current environment: catalog, search view,
    /// pending set, and filter. Used when switching environments.
    pub fn reset_for_environment(&mut self, next: Option<EnvironmentRef>) {
        self.environment = next;
        self.catalog.clear();
        self.catalog_has_more = false;
        self.next_catalog_page = 1;
        self.search_results.clear();
        self.search_term.clear();
        self.pending.clear();
        self.active_filter = PkgFilter::All;
        self.has_update = false;
        self.is_loading = false;
        self.is_loading_search = false;
    }
}
