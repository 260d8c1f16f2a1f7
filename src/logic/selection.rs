//! Selection state machine: toggling, explicit pins, and the pending overlay.

use std::collections::BTreeMap;

use crate::state::{Package, PendingEntry, PkgSelection};

/// A package paired with its effective selection, as shown in a list row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PkgRow {
    /// The catalog (or search) record.
    pub package: Package,
    /// Effective selection: the pending choice, or the installed-state
    /// default when no change is pending.
    pub selection: PkgSelection,
}

/// What: Toggle a package into or out of the pending set.
///
/// Inputs:
/// - `pkg`: Package the user clicked
/// - `pending`: Pending set, keyed by name
///
/// Output:
/// - Mutates `pending`; a name is never present twice (map keyed by name).
///
/// Details:
/// - Installed and unchanged: mark for update (`Latest`) when updatable,
///   otherwise mark for removal (`Remove`).
/// - Installed and marked for removal or update: drop the entry (undo).
/// - Installed and pinned to another version: replace the pin with a removal
///   mark. Note this makes a second click undo the removal, not restore the
///   pin.
/// - Not installed and unselected: select "any" (`Latest`).
/// - Not installed and selected (any choice): drop the entry.
pub fn toggle_select(pkg: &Package, pending: &mut BTreeMap<String, PendingEntry>) {
    let current = pending.get(&pkg.name).map(|e| e.selection.clone());
    let next = match (&pkg.version_installed, current) {
        (Some(_), None) => {
            if pkg.updatable {
                Some(PkgSelection::Latest)
            } else {
                Some(PkgSelection::Remove)
            }
        }
        (Some(installed), Some(PkgSelection::Pin(v))) if v != *installed => {
            Some(PkgSelection::Remove)
        }
        // Removal or update mark, or a pin equal to the installed version:
        // clicking undoes the pending change.
        (Some(_), Some(_)) => None,
        (None, None) => Some(PkgSelection::Latest),
        (None, Some(_)) => None,
    };

    // Last write wins by name: the stale entry goes away before the new one
    // is decided.
    pending.remove(&pkg.name);
    if let Some(selection) = next {
        pending.insert(
            pkg.name.clone(),
            PendingEntry {
                package: pkg.clone(),
                selection,
            },
        );
    }
}

/// What: Record an explicit version choice for a package.
///
/// Inputs:
/// - `pkg`: Package the choice applies to
/// - `selection`: Picked selection (`Pin`, `Latest`, or `Remove`)
/// - `pending`: Pending set, keyed by name
///
/// Output:
/// - Mutates `pending`: the entry is present iff the choice differs from the
///   package's installed state.
///
/// Details:
/// - Installed: any selection other than a pin equal to the installed
///   version is a pending change (including `Remove`).
/// - Not installed: any selection other than `Remove` is a pending change.
pub fn select_version(
    pkg: &Package,
    selection: PkgSelection,
    pending: &mut BTreeMap<String, PendingEntry>,
) {
    pending.remove(&pkg.name);
    let differs = match &pkg.version_installed {
        Some(installed) => selection != PkgSelection::Pin(installed.clone()),
        None => selection != PkgSelection::Remove,
    };
    if differs {
        pending.insert(
            pkg.name.clone(),
            PendingEntry {
                package: pkg.clone(),
                selection,
            },
        );
    }
}

/// What: Empty the pending set without contacting the remote.
///
/// Inputs:
/// - `pending`: Pending set to clear
///
/// Output:
/// - `pending` is empty. With the overlay model there is no per-package
///   `version_selected` field to reset; dropping the entries is the whole
///   cancellation.
pub fn clear_pending(pending: &mut BTreeMap<String, PendingEntry>) {
    pending.clear();
}

/// What: Produce the list to render by overlaying pending choices on a view.
///
/// Inputs:
/// - `view`: Catalog or search results acting as display source
/// - `pending`: Pending set
///
/// Output:
/// - One [`PkgRow`] per package in `view`, with the pending selection when
///   present, else the installed version (installed) or the unselected
///   sentinel (not installed).
///
/// Details:
/// - Pure projection: neither `view` nor `pending` is mutated, and the
///   returned rows are fresh clones.
#[must_use]
pub fn combine_with_pending(
    view: &[Package],
    pending: &BTreeMap<String, PendingEntry>,
) -> Vec<PkgRow> {
    view.iter()
        .map(|pkg| {
            let selection = match pending.get(&pkg.name) {
                Some(entry) => entry.selection.clone(),
                None => match &pkg.version_installed {
                    Some(v) => PkgSelection::Pin(v.clone()),
                    None => PkgSelection::Remove,
                },
            };
            PkgRow {
                package: pkg.clone(),
                selection,
            }
        })
        .collect()
}
