//! Pure category filters over display rows.

use std::collections::BTreeMap;

use crate::logic::selection::PkgRow;
use crate::state::{PendingEntry, PkgFilter};

/// What: Apply the active category filter to a list of display rows.
///
/// Inputs:
/// - `rows`: Rows produced by [`crate::logic::combine_with_pending`]
/// - `filter`: Active category
/// - `pending`: Pending set, used only by the `Selected` category
///
/// Output:
/// - Filtered copy of `rows`; for `Selected`, the pending entries themselves
///   regardless of the current display source.
///
/// Details:
/// - Pure projection; neither input is mutated.
#[must_use]
pub fn apply_filter(
    rows: &[PkgRow],
    filter: PkgFilter,
    pending: &BTreeMap<String, PendingEntry>,
) -> Vec<PkgRow> {
    match filter {
        PkgFilter::All => rows.to_vec(),
        PkgFilter::Installed => rows
            .iter()
            .filter(|r| r.package.is_installed())
            .cloned()
            .collect(),
        PkgFilter::Available => rows
            .iter()
            .filter(|r| !r.package.is_installed())
            .cloned()
            .collect(),
        PkgFilter::Updatable => rows
            .iter()
            .filter(|r| r.package.updatable)
            .cloned()
            .collect(),
        PkgFilter::Selected => pending
            .values()
            .map(|entry| PkgRow {
                package: entry.package.clone(),
                selection: entry.selection.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{combine_with_pending, toggle_select};
    use crate::state::Package;

    fn pkg(name: &str, installed: Option<&str>, updatable: bool) -> Package {
        Package {
            name: name.to_string(),
            versions_available: vec!["1.0".into(), "2.0".into()],
            version_installed: installed.map(str::to_string),
            summary: String::new(),
            updatable,
        }
    }

    #[test]
    /// What: Category predicates partition the view as expected
    ///
    /// - Input: Mixed installed/available/updatable view
    /// - Output: Installed, Available and Updatable pick the right subsets;
    ///   All is the identity
    fn filter_categories_select_expected_rows() {
        let view = vec![
            pkg("installed-old", Some("1.0"), true),
            pkg("installed-current", Some("2.0"), false),
            pkg("fresh", None, false),
        ];
        let pending = BTreeMap::new();
        let rows = combine_with_pending(&view, &pending);

        assert_eq!(apply_filter(&rows, PkgFilter::All, &pending).len(), 3);
        let installed = apply_filter(&rows, PkgFilter::Installed, &pending);
        assert_eq!(installed.len(), 2);
        let available = apply_filter(&rows, PkgFilter::Available, &pending);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].package.name, "fresh");
        let updatable = apply_filter(&rows, PkgFilter::Updatable, &pending);
        assert_eq!(updatable.len(), 1);
        assert_eq!(updatable[0].package.name, "installed-old");
    }

    #[test]
    /// What: Selected category returns the pending set, not a view subset
    ///
    /// - Input: Pending entry for a package absent from the current view
    /// - Output: Selected yields the pending entry anyway
    fn filter_selected_returns_pending_directly() {
        let hidden = pkg("hidden", None, false);
        let mut pending = BTreeMap::new();
        toggle_select(&hidden, &mut pending);

        let view = vec![pkg("visible", Some("1.0"), false)];
        let rows = combine_with_pending(&view, &pending);

        let selected = apply_filter(&rows, PkgFilter::Selected, &pending);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].package.name, "hidden");
    }
}
