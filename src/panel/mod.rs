//! Package panel controller.
//!
//! Owns the [`PanelState`] and exposes the user-facing intents: category
//! change, row click, version pick, search, apply, update-all, cancel,
//! refresh, and incremental load. Long-running work is split into a
//! synchronous `begin_*` step and an async resolution step so stale
//! completions can be detected by comparing a captured snapshot against the
//! current state, never by cancellation tokens.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::build::final_build_status;
use crate::client::CatalogClient;
use crate::logic::plan::{self, ActionPlan, ApplyStrategy};
use crate::logic::{apply_filter, clear_pending, combine_with_pending, mark_updatable};
use crate::logic::{PkgRow, select_version, toggle_select};
use crate::state::{BuildStatus, EnvironmentRef, Package, PanelState, PkgFilter, PkgSelection};

/// Result alias shared with the client layer.
pub type Result<T> = crate::client::Result<T>;

/// Default debounce applied between typing and the search remote call.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Asks the user to confirm a mutating action. Declining is a silent
/// cancellation, never an error.
pub trait ConfirmPrompt {
    /// Return `true` when the user accepts the action.
    fn confirm(&self, title: &str, body: &str) -> bool;
}

/// Sink for user-visible notifications (toast display itself is out of
/// scope; implementations log, print, or forward).
pub trait Notify {
    /// A long-running action started.
    fn info(&self, message: &str);
    /// An action finished successfully.
    fn success(&self, message: &str);
    /// An action failed; shown persistently.
    fn error(&self, message: &str);
}

/// Outcome of an apply-style intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The plan was executed and every build completed.
    Applied,
    /// The user declined the confirmation, or the panel was locked.
    Cancelled,
}

/// Effects the shell must run after an environment switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvChangeEffect {
    /// Drop the pending set; pending changes never carry across
    /// environments.
    ClearPending,
    /// Drop the search term and results.
    ClearSearch,
    /// Reset the category filter to All.
    ResetFilter,
    /// Trigger a full catalog refresh for the new environment.
    RefetchCatalog,
}

/// Correlates a debounced search with its eventual resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTicket {
    /// Monotonic query id; only the latest id may fetch and commit.
    pub id: u64,
    /// Term captured when the user typed.
    pub term: String,
}

/// A fetched catalog tied to the environment it was fetched for.
#[derive(Clone, Debug)]
pub struct CatalogRefresh {
    /// Environment the fetch was started for.
    pub environment: EnvironmentRef,
    /// Fetch result.
    pub result: RefreshResult,
}

/// Payload of a catalog fetch.
#[derive(Clone, Debug)]
pub enum RefreshResult {
    /// Packages ready to display.
    Ready {
        /// First catalog page, enriched with available versions and
        /// updatability.
        packages: Vec<Package>,
        /// Further pages exist.
        has_more: bool,
        /// At least one package is updatable.
        has_update: bool,
    },
    /// The environment's last build is not completed; show its status
    /// instead of loading packages.
    NotReady(BuildStatus),
}

/// What a commit attempt did with a fetched catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogOutcome {
    /// The snapshot matched the active environment and was committed.
    Committed,
    /// The environment's last build is pending or failed.
    NotReady(BuildStatus),
    /// The environment changed while the fetch was in flight; the snapshot
    /// was discarded.
    Stale,
}

/// Controller for the package panel.
#[derive(Clone, Debug)]
pub struct PkgPanel {
    /// Reconciliation state (public for rendering shells and tests).
    pub state: PanelState,
    strategy: ApplyStrategy,
    debounce: Duration,
    poll_interval: Duration,
}

impl PkgPanel {
    /// Build a panel with the given backend strategy and timing knobs.
    #[must_use]
    pub fn new(strategy: ApplyStrategy, debounce: Duration, poll_interval: Duration) -> Self {
        Self {
            state: PanelState::default(),
            strategy,
            debounce,
            poll_interval,
        }
    }

    /// The rows to render: display source combined with the pending overlay,
    /// then filtered by the active category.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<PkgRow> {
        let rows = combine_with_pending(self.state.display_source(), &self.state.pending);
        apply_filter(&rows, self.state.active_filter, &self.state.pending)
    }

    /// Change the active category filter. No-op while changes are applying.
    pub fn handle_category_changed(&mut self, filter: PkgFilter) {
        if self.state.is_applying_changes {
            return;
        }
        self.state.active_filter = filter;
    }

    /// Toggle a clicked package into or out of the pending set. No-op while
    /// changes are applying.
    pub fn handle_click(&mut self, pkg: &Package) {
        if self.state.is_applying_changes {
            return;
        }
        toggle_select(pkg, &mut self.state.pending);
        if self.state.pending.is_empty() && self.state.active_filter == PkgFilter::Selected {
            self.state.active_filter = PkgFilter::All;
        }
    }

    /// Record an explicit version pick. No-op while changes are applying.
    pub fn handle_version_selection(&mut self, pkg: &Package, selection: PkgSelection) {
        if self.state.is_applying_changes {
            return;
        }
        select_version(pkg, selection, &mut self.state.pending);
    }

    /// Drop all pending changes without contacting the remote. No-op while
    /// changes are applying.
    pub fn cancel(&mut self) {
        if self.state.is_applying_changes {
            return;
        }
        clear_pending(&mut self.state.pending);
    }

    /// What: Record a typed search term and issue a ticket for it.
    ///
    /// Inputs:
    /// - `term`: Current input text
    ///
    /// Output:
    /// - `Some(QueryTicket)` to pass to [`Self::resolve_search`]; `None`
    ///   when the panel is locked or the term is empty (which immediately
    ///   restores the catalog as display source).
    ///
    /// Details:
    /// - The displayed list is empty from this point until the matching
    ///   resolution commits, so results for a previous term are never shown.
    pub fn begin_search(&mut self, term: &str) -> Option<QueryTicket> {
        if self.state.is_applying_changes {
            return None;
        }
        self.state.search_term = term.to_string();
        if term.is_empty() {
            self.state.search_results.clear();
            self.state.is_loading_search = false;
            return None;
        }
        self.state.is_loading_search = true;
        let id = self.state.next_query_id;
        self.state.next_query_id += 1;
        self.state.latest_query_id = id;
        Some(QueryTicket {
            id,
            term: term.to_string(),
        })
    }

    /// What: Debounce, fetch, and commit the results for a search ticket.
    ///
    /// Inputs:
    /// - `client`: Remote service client
    /// - `ticket`: Ticket from [`Self::begin_search`]
    ///
    /// Output:
    /// - `Ok(true)` when results were committed; `Ok(false)` when the ticket
    ///   was stale at any checkpoint; the transport error otherwise.
    ///
    /// Details:
    /// - Only the last ticket within the debounce window performs the remote
    ///   call; a response arriving after a newer term was committed is
    ///   discarded by the id re-check.
    pub async fn resolve_search<C: CatalogClient>(
        &mut self,
        client: &C,
        ticket: QueryTicket,
    ) -> Result<bool> {
        tokio::time::sleep(self.debounce).await;
        if ticket.id != self.state.latest_query_id {
            debug!(id = ticket.id, "superseded before fetch, skipping search");
            return Ok(false);
        }

        let fetched = client.search(&ticket.term).await;
        if ticket.id != self.state.latest_query_id || self.state.search_term != ticket.term {
            debug!(id = ticket.id, "stale search response discarded");
            return Ok(false);
        }
        let mut results = match fetched {
            Ok(r) => r,
            Err(e) => {
                self.state.is_loading_search = false;
                return Err(e);
            }
        };

        // Overlay installed state from the catalog so search rows show
        // install/update affordances.
        for pkg in &mut results {
            if let Some(known) = self.state.catalog.iter().find(|c| c.name == pkg.name) {
                pkg.version_installed = known.version_installed.clone();
            }
        }
        mark_updatable(&mut results);
        self.state.search_results = results;
        self.state.is_loading_search = false;
        Ok(true)
    }

    /// Mark the panel as loading and drop catalog-derived state ahead of a
    /// refresh. Pending selections are dropped too: a refresh re-syncs the
    /// baseline they were relative to.
    pub fn begin_refresh(&mut self) {
        self.state.is_loading = true;
        self.state.has_update = false;
        self.state.catalog.clear();
        self.state.catalog_has_more = false;
        self.state.next_catalog_page = 1;
        self.state.pending.clear();
    }

    /// What: Commit a fetched catalog if it still belongs to the active
    /// environment.
    ///
    /// Inputs:
    /// - `refresh`: Result of [`fetch_catalog`]
    ///
    /// Output:
    /// - [`CatalogOutcome::Stale`] when the environment changed since the
    ///   fetch started; the snapshot is discarded and state is untouched.
    pub fn commit_catalog(&mut self, refresh: CatalogRefresh) -> CatalogOutcome {
        if self.state.environment.as_ref() != Some(&refresh.environment) {
            debug!(fetched_for = %refresh.environment, "discarding catalog for a previous environment");
            return CatalogOutcome::Stale;
        }
        self.state.is_loading = false;
        match refresh.result {
            RefreshResult::NotReady(status) => {
                info!(env = %refresh.environment, status = %status, "environment build not completed");
                CatalogOutcome::NotReady(status)
            }
            RefreshResult::Ready {
                packages,
                has_more,
                has_update,
            } => {
                self.state.catalog = packages;
                self.state.catalog_has_more = has_more;
                self.state.next_catalog_page = 2;
                self.state.has_update = has_update;
                CatalogOutcome::Committed
            }
        }
    }

    /// Full refresh convenience: begin, fetch, commit.
    pub async fn refresh<C: CatalogClient>(&mut self, client: &C) -> Result<CatalogOutcome> {
        let Some(env) = self.state.environment.clone() else {
            return Err("no active environment".into());
        };
        self.begin_refresh();
        match fetch_catalog(client, &env).await {
            Ok(refresh) => Ok(self.commit_catalog(refresh)),
            Err(e) => {
                self.state.is_loading = false;
                Err(e)
            }
        }
    }

    /// What: Load the next catalog page when the list bottom is reached.
    ///
    /// Inputs:
    /// - `client`: Remote service client
    ///
    /// Output:
    /// - `Ok(())`; silently does nothing while locked, loading, searching,
    ///   or when no further pages exist.
    pub async fn load_more<C: CatalogClient>(&mut self, client: &C) -> Result<()> {
        if self.state.is_loading
            || self.state.is_applying_changes
            || !self.state.search_term.is_empty()
            || !self.state.catalog_has_more
        {
            return Ok(());
        }
        let Some(env) = self.state.environment.clone() else {
            return Ok(());
        };
        self.state.is_loading = true;
        let page_no = self.state.next_catalog_page;
        let fetched = client.list_installed(&env, page_no).await;
        self.state.is_loading = false;
        let page = fetched?;
        if self.state.environment.as_ref() != Some(&env) {
            return Ok(());
        }

        let names: Vec<String> = page.items.iter().map(|p| p.name.clone()).collect();
        let mut items = page.items;
        if let Ok(versions) = client.available_versions(&names).await {
            for pkg in &mut items {
                if let Some(vs) = versions.get(&pkg.name)
                    && !vs.is_empty()
                {
                    pkg.versions_available = vs.clone();
                }
            }
        }
        self.state.catalog.extend(items);
        self.state.has_update = mark_updatable(&mut self.state.catalog);
        self.state.catalog_has_more = page.has_more;
        self.state.next_catalog_page = page_no + 1;
        Ok(())
    }

    /// What: Derive the effects of an environment switch.
    ///
    /// Inputs:
    /// - `prev`, `next`: Environment before and after
    ///
    /// Output:
    /// - Empty when unchanged; otherwise clear pending and search, reset the
    ///   filter, and refetch the catalog.
    #[must_use]
    pub fn on_environment_changed(
        prev: Option<&EnvironmentRef>,
        next: Option<&EnvironmentRef>,
    ) -> Vec<EnvChangeEffect> {
        if prev == next {
            return Vec::new();
        }
        vec![
            EnvChangeEffect::ClearPending,
            EnvChangeEffect::ClearSearch,
            EnvChangeEffect::ResetFilter,
            EnvChangeEffect::RefetchCatalog,
        ]
    }

    /// Switch the active environment, applying the local effects atomically.
    /// Returns the full effect list; the caller runs `RefetchCatalog`.
    /// No-op while changes are applying.
    pub fn change_environment(&mut self, next: Option<EnvironmentRef>) -> Vec<EnvChangeEffect> {
        if self.state.is_applying_changes {
            return Vec::new();
        }
        let effects = Self::on_environment_changed(self.state.environment.as_ref(), next.as_ref());
        if !effects.is_empty() {
            info!(
                prev = self.state.environment.as_ref().map(ToString::to_string),
                next = next.as_ref().map(ToString::to_string),
                "environment changed"
            );
            self.state.reset_for_environment(next);
        }
        effects
    }

    /// What: Apply the pending set against the backend.
    ///
    /// Inputs:
    /// - `client`: Remote service client
    /// - `confirm`: Confirmation prompt; declining cancels silently
    /// - `notify`: Notification sink
    ///
    /// Output:
    /// - `Ok(Applied)`, `Ok(Cancelled)`, or the first remote error.
    ///
    /// Details:
    /// - The panel is locked for the duration. Whatever happens (success,
    ///   failure, or a declined confirmation), the cleanup path runs: the
    ///   pending set is cleared, the filter resets to All, the lock is
    ///   released, and a full refresh re-syncs the catalog with whatever
    ///   the backend actually committed. Failed stages are not rolled back.
    pub async fn apply_pending<C, P, N>(
        &mut self,
        client: &C,
        confirm: &P,
        notify: &N,
    ) -> Result<ApplyOutcome>
    where
        C: CatalogClient,
        P: ConfirmPrompt,
        N: Notify,
    {
        if self.state.is_applying_changes {
            return Ok(ApplyOutcome::Cancelled);
        }
        let Some(env) = self.state.environment.clone() else {
            return Err("no active environment".into());
        };
        self.state.search_term.clear();
        self.state.search_results.clear();
        self.state.is_loading_search = false;
        self.state.active_filter = PkgFilter::Selected;

        let mut result: Result<ApplyOutcome> = Ok(ApplyOutcome::Cancelled);
        if confirm.confirm(
            "Package actions",
            "Please confirm you want to apply the selected actions?",
        ) {
            self.state.is_applying_changes = true;
            notify.info("Starting package actions");
            let plan = ActionPlan::partition(&self.state.pending);
            result = plan::execute(client, &env, &plan, self.strategy, self.poll_interval)
                .await
                .map(|()| ApplyOutcome::Applied);
        }

        self.finish_apply(client, &result, notify, "Package actions successfully done.")
            .await;
        result
    }

    /// What: Update every package in the environment in one remote call.
    ///
    /// Inputs and contract as [`Self::apply_pending`], bypassing the
    /// planner's per-package partition.
    pub async fn update_all<C, P, N>(
        &mut self,
        client: &C,
        confirm: &P,
        notify: &N,
    ) -> Result<ApplyOutcome>
    where
        C: CatalogClient,
        P: ConfirmPrompt,
        N: Notify,
    {
        if self.state.is_applying_changes {
            return Ok(ApplyOutcome::Cancelled);
        }
        let Some(env) = self.state.environment.clone() else {
            return Err("no active environment".into());
        };
        self.state.search_term.clear();
        self.state.search_results.clear();
        self.state.is_loading_search = false;
        self.state.active_filter = PkgFilter::Updatable;

        let mut result: Result<ApplyOutcome> = Ok(ApplyOutcome::Cancelled);
        if confirm.confirm(
            "Update all",
            "Please confirm you want to update all packages? The service \
             enforces environment consistency, so maybe only a subset of the \
             available updates will be applied.",
        ) {
            self.state.is_applying_changes = true;
            notify.info("Updating packages");
            result = async {
                let build = client.update_all(&env).await?;
                let status = final_build_status(client, build, self.poll_interval, |s| {
                    info!(build, status = %s, "waiting for update build");
                })
                .await?;
                if status == BuildStatus::Failed {
                    return Err(format!("update build {build} failed").into());
                }
                Ok(ApplyOutcome::Applied)
            }
            .await;
        }

        self.finish_apply(client, &result, notify, "Packages updated successfully.")
            .await;
        result
    }

    /// Repopulate the server-side package index, then refresh. Index errors
    /// are logged, not fatal; the refresh still runs.
    pub async fn refresh_available_packages<C: CatalogClient>(
        &mut self,
        client: &C,
    ) -> Result<CatalogOutcome> {
        if let Err(e) = client.refresh_available_packages().await {
            warn!(error = %e, "refreshing the available package index failed");
        }
        self.refresh(client).await
    }

    /// Guaranteed cleanup shared by the apply-style intents: unlock, clear
    /// pending, reset the filter, refresh, and notify the outcome.
    async fn finish_apply<C: CatalogClient, N: Notify>(
        &mut self,
        client: &C,
        result: &Result<ApplyOutcome>,
        notify: &N,
        success_message: &str,
    ) {
        self.state.is_applying_changes = false;
        self.state.pending.clear();
        self.state.active_filter = PkgFilter::All;
        if let Err(e) = self.refresh(client).await {
            warn!(error = %e, "catalog refresh after apply failed");
        }
        match result {
            Ok(ApplyOutcome::Applied) => notify.success(success_message),
            // Declined confirmation: silent no-op, no notification.
            Ok(ApplyOutcome::Cancelled) => {}
            Err(e) => notify.error(&format!("{e}")),
        }
    }
}

/// What: Fetch the catalog for an environment, gated on build completion.
///
/// Inputs:
/// - `client`: Remote service client
/// - `env`: Environment to load, captured into the returned snapshot
///
/// Output:
/// - A [`CatalogRefresh`] tying the fetched packages (or the not-ready
///   status) to `env`, so [`PkgPanel::commit_catalog`] can detect staleness.
///
/// Details:
/// - Loads the first installed page, enriches it with available versions,
///   and derives updatability. Further pages load via
///   [`PkgPanel::load_more`].
pub async fn fetch_catalog<C: CatalogClient>(
    client: &C,
    env: &EnvironmentRef,
) -> Result<CatalogRefresh> {
    if let Some(status) = client.current_build_status(env).await?
        && status != BuildStatus::Completed
    {
        return Ok(CatalogRefresh {
            environment: env.clone(),
            result: RefreshResult::NotReady(status),
        });
    }

    let page = client.list_installed(env, 1).await?;
    let names: Vec<String> = page.items.iter().map(|p| p.name.clone()).collect();
    let mut packages = page.items;
    let versions = client.available_versions(&names).await?;
    for pkg in &mut packages {
        if let Some(vs) = versions.get(&pkg.name)
            && !vs.is_empty()
        {
            pkg.versions_available = vs.clone();
        }
    }
    let has_update = mark_updatable(&mut packages);
    Ok(CatalogRefresh {
        environment: env.clone(),
        result: RefreshResult::Ready {
            packages,
            has_more: page.has_more,
            has_update,
        },
    })
}

#[cfg(test)]
mod tests;
