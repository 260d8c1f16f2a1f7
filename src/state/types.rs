//! Core value types used by envdeck state.

use std::fmt;

/// Desired post-apply state for a single package.
///
/// This replaces the wire-level sentinel strings of the conda-store protocol
/// (`""` for "any/latest", `"none"` for "remove or unselected") with an
/// explicit enum so the selection model cannot hold ambiguous strings.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PkgSelection {
    /// Accept whatever the solver picks as newest (`""` on the wire). Used
    /// for fresh installs without a pin and for accepting an update.
    Latest,
    /// Remove the package if installed; for a not-installed package this is
    /// the unselected state (`"none"` on the wire).
    Remove,
    /// Explicit version pin (`name=version` on the wire).
    Pin(String),
}

impl PkgSelection {
    /// Return the wire-level sentinel used by the conda-store protocol.
    ///
    /// Inputs: none
    ///
    /// Output: `""`, `"none"`, or the pinned version string.
    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            PkgSelection::Latest => "",
            PkgSelection::Remove => "none",
            PkgSelection::Pin(v) => v.as_str(),
        }
    }

    /// Parse a wire-level sentinel back into a selection.
    ///
    /// Inputs: `s` wire string (`""`, `"none"`, or a version).
    ///
    /// Output: The corresponding [`PkgSelection`].
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "" => PkgSelection::Latest,
            "none" => PkgSelection::Remove,
            v => PkgSelection::Pin(v.to_string()),
        }
    }
}

impl fmt::Display for PkgSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PkgSelection::Latest => f.write_str("latest"),
            PkgSelection::Remove => f.write_str("none"),
            PkgSelection::Pin(v) => f.write_str(v),
        }
    }
}

/// One row of the package catalog.
///
/// Immutable record: the user's pending choice lives in the panel's pending
/// map, never on the package itself, so a package shared between the catalog
/// and a search-result list can never be mutated through an alias.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Package {
    /// Canonical package name, unique within an environment.
    pub name: String,
    /// Known versions, ordered by the catalog with the newest last.
    pub versions_available: Vec<String>,
    /// Installed version, if the package is part of the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_installed: Option<String>,
    /// One-line description suitable for list display.
    #[serde(default)]
    pub summary: String,
    /// Whether the newest available version strictly exceeds the installed
    /// one under semver precedence. Derived once per catalog refresh.
    #[serde(default)]
    pub updatable: bool,
}

impl Package {
    /// Return the newest known version, i.e. the last catalog entry.
    #[must_use]
    pub fn newest_available(&self) -> Option<&str> {
        self.versions_available.last().map(String::as_str)
    }

    /// Whether the package is installed in the active environment.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.version_installed.is_some()
    }
}

/// A package carried in the pending set together with the user's choice.
///
/// The package snapshot is kept alongside the selection so the planner can
/// partition pending changes without consulting the (possibly replaced)
/// catalog or search list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingEntry {
    /// Snapshot of the package at selection time.
    pub package: Package,
    /// The user's requested post-apply state.
    pub selection: PkgSelection,
}

/// View filter over the displayed package list. Pure projection; never
/// mutates the pending set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PkgFilter {
    /// Show every package in the current view.
    #[default]
    All,
    /// Only packages with an installed version.
    Installed,
    /// Only packages without an installed version.
    Available,
    /// Only packages with a newer version available.
    Updatable,
    /// The pending set itself, regardless of the current view.
    Selected,
}

impl PkgFilter {
    /// Return the string key used in settings files and CLI flags.
    ///
    /// Inputs: none
    ///
    /// Output: Static config key string.
    #[must_use]
    pub fn as_config_key(&self) -> &'static str {
        match self {
            PkgFilter::All => "all",
            PkgFilter::Installed => "installed",
            PkgFilter::Available => "available",
            PkgFilter::Updatable => "updatable",
            PkgFilter::Selected => "selected",
        }
    }

    /// Parse a filter from its settings key or legacy aliases.
    ///
    /// Inputs: `s` config string (case-insensitive).
    ///
    /// Output: `Some(PkgFilter)` on recognized value; `None` otherwise.
    #[must_use]
    pub fn from_config_key(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Some(PkgFilter::All),
            "installed" => Some(PkgFilter::Installed),
            "available" | "not_installed" => Some(PkgFilter::Available),
            "updatable" | "updates" => Some(PkgFilter::Updatable),
            "selected" | "pending" => Some(PkgFilter::Selected),
            _ => None,
        }
    }
}

/// Identifies a remote environment on the package service.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EnvironmentRef {
    /// Namespace the environment belongs to.
    pub namespace: String,
    /// Environment name within the namespace.
    pub name: String,
}

impl EnvironmentRef {
    /// Build a reference from namespace and name parts.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EnvironmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identifier of an asynchronous build job on the package service.
pub type BuildId = u64;

/// Status of a remote environment build.
///
/// Builds progress `QUEUED -> BUILDING -> {COMPLETED | FAILED}`; only the
/// last two are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    /// Accepted by the service, not started yet.
    Queued,
    /// Build in progress.
    Building,
    /// Terminal: the environment was materialized.
    Completed,
    /// Terminal: the build failed; the environment is unchanged.
    Failed,
}

impl BuildStatus {
    /// Whether the status is terminal (no further polling needed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStatus::Completed | BuildStatus::Failed)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Queued => "QUEUED",
            BuildStatus::Building => "BUILDING",
            BuildStatus::Completed => "COMPLETED",
            BuildStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}
