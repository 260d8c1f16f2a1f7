//! Action planner: partition the pending set and execute it against the
//! backend.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{info, warn};

use crate::build::final_build_status;
use crate::client::{CatalogClient, Result};
use crate::state::{BuildStatus, EnvironmentRef, PendingEntry, PkgSelection};

/// Minimal set of remote operations derived from the pending set.
///
/// The three lists are a total, disjoint cover of pending: every pending
/// package lands in exactly one bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionPlan {
    /// Names to remove (installed, marked `Remove`).
    pub to_remove: Vec<String>,
    /// Names to update (updatable, marked `Latest`).
    pub to_update: Vec<String>,
    /// Install atoms: `name` for "any version", `name=version` for pins.
    pub to_install: Vec<String>,
}

impl ActionPlan {
    /// Whether the plan contains no operation at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_update.is_empty() && self.to_install.is_empty()
    }

    /// What: Partition the pending set into remove/update/install buckets.
    ///
    /// Inputs:
    /// - `pending`: Pending entries keyed by name
    ///
    /// Output:
    /// - An [`ActionPlan`] covering every entry exactly once.
    ///
    /// Details:
    /// - Installed + `Remove` -> removal; updatable + `Latest` -> update;
    ///   everything else is an install (pins format as `name=version`,
    ///   `Latest` as the bare name).
    #[must_use]
    pub fn partition(pending: &BTreeMap<String, PendingEntry>) -> Self {
        let mut plan = ActionPlan::default();
        for (name, entry) in pending {
            match &entry.selection {
                PkgSelection::Remove if entry.package.is_installed() => {
                    plan.to_remove.push(name.clone());
                }
                PkgSelection::Latest if entry.package.updatable => {
                    plan.to_update.push(name.clone());
                }
                PkgSelection::Pin(v) => plan.to_install.push(format!("{name}={v}")),
                _ => plan.to_install.push(name.clone()),
            }
        }
        plan
    }
}

/// How the plan is pushed to the backend.
///
/// Chosen once at construction from the backend's capabilities; the
/// atomic-spec strategy is preferred when both are available since it yields
/// a single consistent build instead of three.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ApplyStrategy {
    /// Up to three sequential calls: remove, then update, then install.
    Staged,
    /// One call carrying the full desired dependency list.
    #[default]
    AtomicSpec,
}

/// Split a dependency atom into its name and (possibly empty) version.
fn split_atom(atom: &str) -> (&str, &str) {
    match atom.split_once('=') {
        Some((name, version)) => (name, version),
        None => (atom, ""),
    }
}

/// Join a name and version back into a dependency atom.
fn join_atom(name: &str, version: &str) -> String {
    if version.is_empty() {
        name.to_string()
    } else {
        format!("{name}={version}")
    }
}

/// What: Compute the desired dependency list for an atomic-spec submission.
///
/// Inputs:
/// - `current`: The environment's current specification atoms
/// - `plan`: Partitioned pending changes
///
/// Output:
/// - New atom list: removals omitted, updates unpinned, installs merged
///   last-write-wins by name; original ordering preserved, new packages
///   appended.
#[must_use]
pub fn merge_spec(current: &[String], plan: &ActionPlan) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut versions: BTreeMap<String, String> = BTreeMap::new();
    for atom in current {
        let (name, version) = split_atom(atom);
        if !versions.contains_key(name) {
            order.push(name.to_string());
        }
        versions.insert(name.to_string(), version.to_string());
    }

    for name in &plan.to_remove {
        versions.remove(name);
        order.retain(|n| n != name);
    }
    for name in &plan.to_update {
        // Unpinned: let the solver pick the newest consistent version.
        versions.insert(name.clone(), String::new());
        if !order.iter().any(|n| n == name) {
            order.push(name.clone());
        }
    }
    for atom in &plan.to_install {
        let (name, version) = split_atom(atom);
        if !versions.contains_key(name) {
            order.push(name.to_string());
        }
        versions.insert(name.to_string(), version.to_string());
    }

    order
        .iter()
        .filter_map(|name| versions.get(name).map(|v| join_atom(name, v)))
        .collect()
}

/// What: Execute a plan against the backend under the chosen strategy.
///
/// Inputs:
/// - `client`: Remote service client
/// - `env`: Target environment
/// - `plan`: Partitioned pending changes
/// - `strategy`: Staged or atomic-spec execution
/// - `poll_interval`: Delay between build-status polls
///
/// Output:
/// - `Ok(())` when every triggered build completed; the first failure
///   otherwise.
///
/// Details:
/// - Staged order matters: removals commit before updates and installs so a
///   later stage sees the earlier stage's result. Each stage waits for its
///   build to finish; a rejected call or failed build aborts the remaining
///   stages. Nothing is rolled back and nothing is retried.
pub async fn execute<C: CatalogClient>(
    client: &C,
    env: &EnvironmentRef,
    plan: &ActionPlan,
    strategy: ApplyStrategy,
    poll_interval: Duration,
) -> Result<()> {
    if plan.is_empty() {
        info!(env = %env, "nothing to apply");
        return Ok(());
    }
    match strategy {
        ApplyStrategy::Staged => execute_staged(client, env, plan, poll_interval).await,
        ApplyStrategy::AtomicSpec => execute_atomic(client, env, plan, poll_interval).await,
    }
}

/// Run one staged call and wait for its build to complete.
async fn run_stage<C: CatalogClient>(
    client: &C,
    stage: &str,
    build: crate::state::BuildId,
    poll_interval: Duration,
) -> Result<()> {
    let status = final_build_status(client, build, poll_interval, |s| {
        info!(stage, build, status = %s, "waiting for build");
    })
    .await?;
    if status == BuildStatus::Failed {
        warn!(stage, build, "stage build failed, aborting remaining stages");
        return Err(format!("{stage} build {build} failed").into());
    }
    Ok(())
}

async fn execute_staged<C: CatalogClient>(
    client: &C,
    env: &EnvironmentRef,
    plan: &ActionPlan,
    poll_interval: Duration,
) -> Result<()> {
    if !plan.to_remove.is_empty() {
        info!(env = %env, count = plan.to_remove.len(), "removing selected packages");
        let build = client.remove(env, &plan.to_remove).await?;
        run_stage(client, "remove", build, poll_interval).await?;
    }
    if !plan.to_update.is_empty() {
        info!(env = %env, count = plan.to_update.len(), "updating selected packages");
        let build = client.update(env, &plan.to_update).await?;
        run_stage(client, "update", build, poll_interval).await?;
    }
    if !plan.to_install.is_empty() {
        info!(env = %env, count = plan.to_install.len(), "installing new packages");
        let build = client.install(env, &plan.to_install).await?;
        run_stage(client, "install", build, poll_interval).await?;
    }
    Ok(())
}

async fn execute_atomic<C: CatalogClient>(
    client: &C,
    env: &EnvironmentRef,
    plan: &ActionPlan,
    poll_interval: Duration,
) -> Result<()> {
    let current = client.specified_dependencies(env).await?;
    let desired = merge_spec(&current, plan);
    info!(env = %env, deps = desired.len(), "submitting desired-state specification");
    let build = client.submit_spec(env, &desired).await?;
    run_stage(client, "specification", build, poll_interval).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Package;

    fn entry(
        name: &str,
        installed: Option<&str>,
        updatable: bool,
        selection: PkgSelection,
    ) -> (String, PendingEntry) {
        (
            name.to_string(),
            PendingEntry {
                package: Package {
                    name: name.to_string(),
                    versions_available: vec!["1.0".into(), "2.0".into()],
                    version_installed: installed.map(str::to_string),
                    summary: String::new(),
                    updatable,
                },
                selection,
            },
        )
    }

    #[test]
    /// What: Partition is a total, disjoint cover of pending
    ///
    /// - Input: One entry per bucket plus a pinned fresh install
    /// - Output: Each entry in exactly one bucket, with wire formatting
    fn plan_partition_total_disjoint_cover() {
        let pending: BTreeMap<String, PendingEntry> = [
            entry("doomed", Some("1.0"), false, PkgSelection::Remove),
            entry("stale", Some("1.0"), true, PkgSelection::Latest),
            entry("fresh", None, false, PkgSelection::Latest),
            entry("pinned", None, false, PkgSelection::Pin("2.1".into())),
        ]
        .into_iter()
        .collect();

        let plan = ActionPlan::partition(&pending);
        assert_eq!(plan.to_remove, vec!["doomed".to_string()]);
        assert_eq!(plan.to_update, vec!["stale".to_string()]);
        assert_eq!(
            plan.to_install,
            vec!["fresh".to_string(), "pinned=2.1".to_string()]
        );
        let covered = plan.to_remove.len() + plan.to_update.len() + plan.to_install.len();
        assert_eq!(covered, pending.len());
    }

    #[test]
    /// What: Installed pin-change goes to the install bucket
    ///
    /// - Input: Installed package pinned to another version
    /// - Output: `name=version` install atom, no removal or update
    fn plan_partition_pin_change_installs() {
        let pending: BTreeMap<String, PendingEntry> =
            [entry("numpy", Some("1.20.0"), true, PkgSelection::Pin("1.22.0".into()))]
                .into_iter()
                .collect();
        let plan = ActionPlan::partition(&pending);
        assert!(plan.to_remove.is_empty());
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.to_install, vec!["numpy=1.22.0".to_string()]);
    }

    #[test]
    /// What: merge_spec drops removals, unpins updates, merges installs
    ///
    /// - Input: Spec with pins; plan touching all three buckets
    /// - Output: Removal omitted, update unpinned, install merged
    ///   last-write-wins, new package appended
    fn plan_merge_spec_desired_state() {
        let current = vec![
            "numpy=1.20.0".to_string(),
            "pandas=1.4.0".to_string(),
            "scipy".to_string(),
        ];
        let plan = ActionPlan {
            to_remove: vec!["pandas".into()],
            to_update: vec!["numpy".into()],
            to_install: vec!["scipy=1.9.0".into(), "flask".into()],
        };
        let next = merge_spec(&current, &plan);
        assert_eq!(
            next,
            vec![
                "numpy".to_string(),
                "scipy=1.9.0".to_string(),
                "flask".to_string(),
            ]
        );
    }

    #[test]
    /// What: merge_spec with an empty plan returns the spec unchanged
    ///
    /// - Input: Arbitrary spec, default plan
    /// - Output: Identical atom list
    fn plan_merge_spec_identity() {
        let current = vec!["a=1".to_string(), "b".to_string()];
        assert_eq!(merge_spec(&current, &ActionPlan::default()), current);
    }
}
