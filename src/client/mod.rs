//! Catalog client abstraction over the remote package-environment service.
//!
//! The engine only depends on the [`CatalogClient`] trait; the conda-store
//! REST implementation lives in [`conda_store`]. Tests drive the engine with
//! scripted stub implementations.

pub mod conda_store;

pub use conda_store::CondaStoreClient;

use crate::state::{BuildId, BuildStatus, EnvironmentRef, Package};

/// Result alias shared by client implementations and their callers.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// One page of a paginated listing.
#[derive(Clone, Debug, Default)]
pub struct PageOf<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Whether further pages exist.
    pub has_more: bool,
}

/// Remote operations the reconciliation engine needs from the package
/// service.
///
/// Staged backends use `remove`/`update`/`install` as three sequential
/// calls; atomic-spec backends use `specified_dependencies` plus
/// `submit_spec` to rebuild the environment in one step. Implementations
/// may back both surfaces with the same underlying mechanism.
#[allow(async_fn_in_trait)]
pub trait CatalogClient {
    /// List installed packages for an environment, one page at a time
    /// (pages start at 1).
    async fn list_installed(&self, env: &EnvironmentRef, page: u64) -> Result<PageOf<Package>>;

    /// Search all available packages matching `term`. Implementations fetch
    /// every page; result rows are aggregated by name with versions ordered
    /// newest last.
    async fn search(&self, term: &str) -> Result<Vec<Package>>;

    /// Known available versions for the given package names, newest last.
    /// Used to enrich an installed-package listing for update detection.
    async fn available_versions(
        &self,
        names: &[String],
    ) -> Result<std::collections::BTreeMap<String, Vec<String>>>;

    /// Remove packages by name. Returns the handle of the build the service
    /// scheduled for the new environment state.
    async fn remove(&self, env: &EnvironmentRef, names: &[String]) -> Result<BuildId>;

    /// Update packages by name to their newest consistent versions.
    async fn update(&self, env: &EnvironmentRef, names: &[String]) -> Result<BuildId>;

    /// Update every package in the environment.
    async fn update_all(&self, env: &EnvironmentRef) -> Result<BuildId>;

    /// Install packages given `name` or `name=version` atoms.
    async fn install(&self, env: &EnvironmentRef, specs: &[String]) -> Result<BuildId>;

    /// Submit the full desired dependency list; the service computes and
    /// builds the new environment image in one step.
    async fn submit_spec(&self, env: &EnvironmentRef, dependencies: &[String]) -> Result<BuildId>;

    /// The dependency list of the environment's current specification, as
    /// `name` or `name=version` atoms.
    async fn specified_dependencies(&self, env: &EnvironmentRef) -> Result<Vec<String>>;

    /// Current status of a build.
    async fn poll_build_status(&self, build: BuildId) -> Result<BuildStatus>;

    /// Status of the environment's most recent build, if any. Used to gate
    /// catalog loading on a completed environment.
    async fn current_build_status(&self, env: &EnvironmentRef) -> Result<Option<BuildStatus>>;

    /// Invalidate or repopulate any server-side package index cache.
    async fn refresh_available_packages(&self) -> Result<()>;
}
