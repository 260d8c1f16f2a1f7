//! Controller tests driven through a scripted stub client.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{ApplyOutcome, CatalogOutcome, ConfirmPrompt, Notify, PkgPanel, fetch_catalog};
use crate::client::{CatalogClient, PageOf, Result};
use crate::logic::ApplyStrategy;
use crate::state::{BuildId, BuildStatus, EnvironmentRef, Package, PkgFilter, PkgSelection};

fn pkg(name: &str, installed: Option<&str>, available: &[&str]) -> Package {
    let versions_available: Vec<String> = available.iter().map(|v| (*v).to_string()).collect();
    let updatable = match (&installed, versions_available.last()) {
        (Some(i), Some(newest)) => *i != newest,
        _ => false,
    };
    Package {
        name: name.to_string(),
        versions_available,
        version_installed: installed.map(str::to_string),
        summary: format!("{name} summary"),
        updatable,
    }
}

fn env() -> EnvironmentRef {
    EnvironmentRef::new("default", "analysis")
}

fn panel(strategy: ApplyStrategy) -> PkgPanel {
    let mut panel = PkgPanel::new(strategy, Duration::ZERO, Duration::ZERO);
    panel.state.environment = Some(env());
    panel
}

#[derive(Default)]
struct StubClient {
    installed: Vec<Package>,
    versions: BTreeMap<String, Vec<String>>,
    search_results: Vec<Package>,
    spec: Vec<String>,
    env_status: Option<BuildStatus>,
    build_statuses: Mutex<Vec<BuildStatus>>,
    calls: Mutex<Vec<String>>,
}

impl StubClient {
    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl CatalogClient for StubClient {
    async fn list_installed(&self, _env: &EnvironmentRef, page: u64) -> Result<PageOf<Package>> {
        self.record(format!("list:{page}"));
        Ok(PageOf {
            items: self.installed.clone(),
            has_more: false,
        })
    }

    async fn search(&self, term: &str) -> Result<Vec<Package>> {
        self.record(format!("search:{term}"));
        Ok(self.search_results.clone())
    }

    async fn available_versions(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self
            .versions
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, vs)| (name.clone(), vs.clone()))
            .collect())
    }

    async fn remove(&self, _env: &EnvironmentRef, names: &[String]) -> Result<BuildId> {
        self.record(format!("remove:{}", names.join(",")));
        Ok(11)
    }

    async fn update(&self, _env: &EnvironmentRef, names: &[String]) -> Result<BuildId> {
        self.record(format!("update:{}", names.join(",")));
        Ok(12)
    }

    async fn update_all(&self, _env: &EnvironmentRef) -> Result<BuildId> {
        self.record("update_all".to_string());
        Ok(13)
    }

    async fn install(&self, _env: &EnvironmentRef, specs: &[String]) -> Result<BuildId> {
        self.record(format!("install:{}", specs.join(",")));
        Ok(14)
    }

    async fn submit_spec(&self, _env: &EnvironmentRef, dependencies: &[String]) -> Result<BuildId> {
        self.record(format!("spec:{}", dependencies.join(",")));
        Ok(15)
    }

    async fn specified_dependencies(&self, _env: &EnvironmentRef) -> Result<Vec<String>> {
        Ok(self.spec.clone())
    }

    async fn poll_build_status(&self, _build: BuildId) -> Result<BuildStatus> {
        let mut scripted = self.build_statuses.lock().expect("statuses lock");
        if scripted.is_empty() {
            Ok(BuildStatus::Completed)
        } else {
            Ok(scripted.remove(0))
        }
    }

    async fn current_build_status(&self, _env: &EnvironmentRef) -> Result<Option<BuildStatus>> {
        Ok(self.env_status)
    }

    async fn refresh_available_packages(&self) -> Result<()> {
        self.record("reindex".to_string());
        Ok(())
    }
}

struct Always(bool);

impl ConfirmPrompt for Always {
    fn confirm(&self, _title: &str, _body: &str) -> bool {
        self.0
    }
}

#[derive(Default)]
struct RecordingNotify {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotify {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }
}

impl Notify for RecordingNotify {
    fn info(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push(format!("info:{message}"));
    }

    fn success(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push(format!("success:{message}"));
    }

    fn error(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push(format!("error:{message}"));
    }
}

#[test]
/// What: Click toggling and the Selected-filter reset
///
/// - Input: Toggle an updatable package on, then off, under the Selected filter
/// - Output: Pending holds Latest after the first click and is empty after the
///   second, at which point the filter falls back to All
fn panel_click_toggle_resets_selected_filter_when_empty() {
    let mut panel = panel(ApplyStrategy::Staged);
    let numpy = pkg("numpy", Some("1.20.0"), &["1.20.0", "1.24.0"]);

    panel.handle_click(&numpy);
    assert_eq!(
        panel.state.pending.get("numpy").map(|e| e.selection.clone()),
        Some(PkgSelection::Latest)
    );

    panel.handle_category_changed(PkgFilter::Selected);
    panel.handle_click(&numpy);
    assert!(panel.state.pending.is_empty());
    assert_eq!(panel.state.active_filter, PkgFilter::All);
}

#[test]
/// What: Lock blocks every mutating intent
///
/// - Input: Click, version pick, cancel, filter change, and search while
///   `is_applying_changes` is set
/// - Output: State is untouched and no search ticket is issued
fn panel_locked_intents_are_noops() {
    let mut panel = panel(ApplyStrategy::Staged);
    panel.state.is_applying_changes = true;
    let numpy = pkg("numpy", Some("1.20.0"), &["1.20.0", "1.24.0"]);

    panel.handle_click(&numpy);
    panel.handle_version_selection(&numpy, PkgSelection::Pin("1.24.0".into()));
    assert!(panel.state.pending.is_empty());

    panel.handle_category_changed(PkgFilter::Updatable);
    assert_eq!(panel.state.active_filter, PkgFilter::All);

    assert!(panel.begin_search("numpy").is_none());
    assert!(panel.state.search_term.is_empty());

    panel.state.pending.insert(
        "numpy".into(),
        crate::state::PendingEntry {
            package: numpy,
            selection: PkgSelection::Latest,
        },
    );
    panel.cancel();
    assert_eq!(panel.state.pending.len(), 1);

    assert!(panel.change_environment(None).is_empty());
}

#[tokio::test]
/// What: Superseded search tickets never fetch or commit
///
/// - Input: Two rapid search terms; the older ticket resolves first
/// - Output: Only the newest term hits the client; results carry installed
///   state overlaid from the catalog
async fn panel_search_discards_superseded_ticket() {
    let mut panel = panel(ApplyStrategy::Staged);
    panel.state.catalog = vec![pkg("numpy", Some("1.20.0"), &["1.20.0"])];
    let client = StubClient {
        search_results: vec![
            pkg("numpy", None, &["1.20.0", "1.24.0"]),
            pkg("numpy-base", None, &["1.24.0"]),
        ],
        ..Default::default()
    };

    let stale = panel.begin_search("num").expect("ticket for num");
    let fresh = panel.begin_search("numpy").expect("ticket for numpy");

    let committed = panel
        .resolve_search(&client, stale)
        .await
        .expect("stale resolution is not an error");
    assert!(!committed);
    assert!(client.calls().is_empty());

    let committed = panel
        .resolve_search(&client, fresh)
        .await
        .expect("fresh resolution");
    assert!(committed);
    assert_eq!(client.calls(), vec!["search:numpy".to_string()]);
    assert!(!panel.state.is_loading_search);

    let numpy = &panel.state.search_results[0];
    assert_eq!(numpy.version_installed.as_deref(), Some("1.20.0"));
    assert!(numpy.updatable);
    assert!(panel.state.search_results[1].version_installed.is_none());
}

#[tokio::test]
/// What: Clearing the search term restores the catalog immediately
///
/// - Input: A committed search, then an empty term
/// - Output: No ticket is issued and the catalog is the display source again
async fn panel_empty_term_restores_catalog() {
    let mut panel = panel(ApplyStrategy::Staged);
    panel.state.catalog = vec![pkg("numpy", Some("1.20.0"), &["1.20.0"])];
    panel.state.search_term = "num".into();
    panel.state.search_results = vec![pkg("numba", None, &["0.59.0"])];

    assert!(panel.begin_search("").is_none());
    assert!(panel.state.search_results.is_empty());
    assert_eq!(panel.visible_rows()[0].package.name, "numpy");
}

#[tokio::test]
/// What: Declined confirmation still runs the cleanup path
///
/// - Input: One pending change; the user declines
/// - Output: Cancelled outcome, no backend mutation, pending cleared, filter
///   reset to All, lock released, and a refresh performed anyway
async fn panel_apply_decline_still_cleans_up() {
    let mut panel = panel(ApplyStrategy::Staged);
    let numpy = pkg("numpy", Some("1.20.0"), &["1.20.0", "1.24.0"]);
    panel.handle_click(&numpy);
    let client = StubClient {
        installed: vec![numpy],
        ..Default::default()
    };
    let notify = RecordingNotify::default();

    let outcome = panel
        .apply_pending(&client, &Always(false), &notify)
        .await
        .expect("decline is not an error");
    assert_eq!(outcome, ApplyOutcome::Cancelled);

    assert!(panel.state.pending.is_empty());
    assert_eq!(panel.state.active_filter, PkgFilter::All);
    assert!(!panel.state.is_applying_changes);
    assert_eq!(client.calls(), vec!["list:1".to_string()]);
    assert!(notify.messages().is_empty());
}

#[tokio::test]
/// What: Staged apply partitions the pending set into backend calls
///
/// - Input: An update toggle, a removal, and a pinned install, applied staged
/// - Output: Remove, update, and install calls in that order, then a refresh;
///   success notified and the pending set cleared
async fn panel_apply_staged_runs_remove_update_install() {
    let mut panel = panel(ApplyStrategy::Staged);
    let numpy = pkg("numpy", Some("1.20.0"), &["1.20.0", "1.24.0"]);
    let flask = pkg("flask", Some("2.0.1"), &["2.0.1"]);
    let scipy = pkg("scipy", None, &["1.7.0", "1.11.0"]);
    panel.handle_click(&numpy); // updatable -> Latest
    panel.handle_click(&flask); // installed, no update -> Remove
    panel.handle_version_selection(&scipy, PkgSelection::Pin("1.11.0".into()));
    let client = StubClient::default();
    let notify = RecordingNotify::default();

    let outcome = panel
        .apply_pending(&client, &Always(true), &notify)
        .await
        .expect("apply succeeds");
    assert_eq!(outcome, ApplyOutcome::Applied);

    assert_eq!(
        client.calls(),
        vec![
            "remove:flask".to_string(),
            "update:numpy".to_string(),
            "install:scipy=1.11.0".to_string(),
            "list:1".to_string(),
        ]
    );
    assert!(panel.state.pending.is_empty());
    assert!(!panel.state.is_applying_changes);
    assert!(
        notify
            .messages()
            .iter()
            .any(|m| m.starts_with("success:"))
    );
}

#[tokio::test]
/// What: Atomic apply submits one merged specification
///
/// - Input: A pending update over a pinned spec entry, applied atomically
/// - Output: A single spec submission with the entry unpinned, order kept
async fn panel_apply_atomic_submits_merged_spec() {
    let mut panel = panel(ApplyStrategy::AtomicSpec);
    let numpy = pkg("numpy", Some("1.20.0"), &["1.20.0", "1.24.0"]);
    panel.handle_click(&numpy);
    let client = StubClient {
        spec: vec!["numpy=1.20.0".into(), "pandas".into()],
        ..Default::default()
    };
    let notify = RecordingNotify::default();

    let outcome = panel
        .apply_pending(&client, &Always(true), &notify)
        .await
        .expect("apply succeeds");
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(
        client.calls(),
        vec!["spec:numpy,pandas".to_string(), "list:1".to_string()]
    );
}

#[tokio::test]
/// What: A failed stage build aborts the rest but still cleans up
///
/// - Input: A removal and an install; the remove build fails
/// - Output: Error returned and notified, install never attempted, lock
///   released, pending cleared, refresh performed
async fn panel_apply_stage_failure_aborts_and_unlocks() {
    let mut panel = panel(ApplyStrategy::Staged);
    let flask = pkg("flask", Some("2.0.1"), &["2.0.1"]);
    let scipy = pkg("scipy", None, &["1.11.0"]);
    panel.handle_click(&flask);
    panel.handle_click(&scipy);
    let client = StubClient {
        build_statuses: Mutex::new(vec![BuildStatus::Failed]),
        ..Default::default()
    };
    let notify = RecordingNotify::default();

    let result = panel.apply_pending(&client, &Always(true), &notify).await;
    assert!(result.is_err());

    let calls = client.calls();
    assert!(calls.contains(&"remove:flask".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("install:")));
    assert!(calls.contains(&"list:1".to_string()));
    assert!(!panel.state.is_applying_changes);
    assert!(panel.state.pending.is_empty());
    assert!(notify.messages().iter().any(|m| m.starts_with("error:")));
}

#[tokio::test]
/// What: Update-all bypasses the planner and waits for its build
///
/// - Input: Confirmed update-all
/// - Output: One update_all call followed by a refresh; success notified
async fn panel_update_all_single_call_then_refresh() {
    let mut panel = panel(ApplyStrategy::Staged);
    let client = StubClient::default();
    let notify = RecordingNotify::default();

    let outcome = panel
        .update_all(&client, &Always(true), &notify)
        .await
        .expect("update all succeeds");
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(
        client.calls(),
        vec!["update_all".to_string(), "list:1".to_string()]
    );
    assert!(
        notify
            .messages()
            .iter()
            .any(|m| m.starts_with("success:"))
    );
}

#[tokio::test]
/// What: Catalog fetched for a previous environment is discarded
///
/// - Input: A fetch for environment A committed after switching to B
/// - Output: Stale outcome; B's empty catalog is not overwritten
async fn panel_commit_discards_catalog_for_previous_environment() {
    let mut panel = panel(ApplyStrategy::Staged);
    let client = StubClient {
        installed: vec![pkg("numpy", Some("1.20.0"), &["1.20.0"])],
        ..Default::default()
    };

    let fetched = fetch_catalog(&client, &env()).await.expect("fetch");
    panel.change_environment(Some(EnvironmentRef::new("default", "ml")));

    assert_eq!(panel.commit_catalog(fetched), CatalogOutcome::Stale);
    assert!(panel.state.catalog.is_empty());
}

#[tokio::test]
/// What: Catalog loading is gated on a completed environment build
///
/// - Input: An environment whose last build is still building
/// - Output: NotReady with that status; no package listing attempted
async fn panel_refresh_not_ready_while_building() {
    let mut panel = panel(ApplyStrategy::Staged);
    let client = StubClient {
        env_status: Some(BuildStatus::Building),
        ..Default::default()
    };

    let outcome = panel.refresh(&client).await.expect("refresh");
    assert_eq!(outcome, CatalogOutcome::NotReady(BuildStatus::Building));
    assert!(!panel.state.is_loading);
    assert!(client.calls().is_empty());
}

#[tokio::test]
/// What: Refresh enriches installed packages and derives updatability
///
/// - Input: One installed package with a newer version in the index
/// - Output: Committed catalog with merged versions, updatable set, and
///   has_update raised; prior pending entries dropped
async fn panel_refresh_commits_enriched_catalog() {
    let mut panel = panel(ApplyStrategy::Staged);
    let scipy = pkg("scipy", None, &["1.11.0"]);
    panel.handle_click(&scipy);
    let client = StubClient {
        installed: vec![pkg("numpy", Some("1.20.0"), &["1.20.0"])],
        versions: BTreeMap::from([(
            "numpy".to_string(),
            vec!["1.20.0".to_string(), "1.24.0".to_string()],
        )]),
        env_status: Some(BuildStatus::Completed),
        ..Default::default()
    };

    let outcome = panel.refresh(&client).await.expect("refresh");
    assert_eq!(outcome, CatalogOutcome::Committed);
    assert!(panel.state.pending.is_empty());
    assert!(panel.state.has_update);
    let numpy = &panel.state.catalog[0];
    assert_eq!(numpy.versions_available, vec!["1.20.0", "1.24.0"]);
    assert!(numpy.updatable);
}

#[tokio::test]
/// What: Index refresh failures do not block the catalog reload
///
/// - Input: refresh_available_packages against a stub that succeeds
/// - Output: Reindex call recorded, then a normal committed refresh
async fn panel_reindex_then_refresh() {
    let mut panel = panel(ApplyStrategy::Staged);
    let client = StubClient {
        installed: vec![pkg("numpy", Some("1.20.0"), &["1.20.0"])],
        ..Default::default()
    };

    let outcome = panel
        .refresh_available_packages(&client)
        .await
        .expect("refresh");
    assert_eq!(outcome, CatalogOutcome::Committed);
    assert_eq!(
        client.calls(),
        vec!["reindex".to_string(), "list:1".to_string()]
    );
}

#[test]
/// What: Environment-change effect derivation
///
/// - Input: Same environment twice; a genuine switch
/// - Output: No effects, resp. the full clear/reset/refetch set
fn panel_environment_change_effects() {
    let a = env();
    assert!(PkgPanel::on_environment_changed(Some(&a), Some(&a)).is_empty());

    let b = EnvironmentRef::new("default", "ml");
    let effects = PkgPanel::on_environment_changed(Some(&a), Some(&b));
    assert_eq!(effects.len(), 4);
    assert!(effects.contains(&super::EnvChangeEffect::ClearPending));
    assert!(effects.contains(&super::EnvChangeEffect::RefetchCatalog));
}
