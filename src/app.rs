//! CLI runtime: wires settings, the REST client, and the panel controller
//! into one-shot command flows.

use std::io::Write as _;
use std::path::Path;

use tracing::{error, info, warn};

use crate::args::Args;
use crate::build::final_build_status;
use crate::client::{CatalogClient, CondaStoreClient};
use crate::logic::{ApplyStrategy, PkgRow};
use crate::panel::{ConfirmPrompt, Notify, PkgPanel};
use crate::settings::{SETTINGS_FILE, Settings, config_dir};
use crate::state::{EnvironmentRef, Package, PkgFilter, PkgSelection};

/// Result alias shared with the rest of the crate.
pub type Result<T> = crate::client::Result<T>;

/// Confirmation prompt reading y/N from stdin.
struct StdinPrompt;

impl ConfirmPrompt for StdinPrompt {
    fn confirm(&self, title: &str, body: &str) -> bool {
        println!("{title}");
        print!("{body} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Confirmation prompt that accepts everything (`--yes`).
struct AssumeYes;

impl ConfirmPrompt for AssumeYes {
    fn confirm(&self, _title: &str, _body: &str) -> bool {
        true
    }
}

/// Notification sink printing to the terminal and the log.
struct CliNotify;

impl Notify for CliNotify {
    fn info(&self, message: &str) {
        info!("{message}");
        println!("{message}");
    }

    fn success(&self, message: &str) {
        info!("{message}");
        println!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
        eprintln!("{message}");
    }
}

/// What: Dispatch parsed arguments to the matching one-shot flow.
///
/// Inputs:
/// - `args`: Parsed command line
///
/// Output:
/// - `Ok(())` when the flow completed; the first error otherwise.
///
/// Details:
/// - Exactly one flow runs per invocation, checked in order: watch, status,
///   search, update-all, pending mutations (remove/update/install), listing.
///   Bare `envdeck` with an environment configured defaults to the listing.
pub async fn run(args: Args) -> Result<()> {
    let settings = match &args.config {
        Some(path) => Settings::load(Path::new(path)),
        None => Settings::load(&config_dir().join(SETTINGS_FILE)),
    };
    let server = args.server.clone().unwrap_or_else(|| settings.server_url.clone());
    let client = CondaStoreClient::new(server, settings.page_size);

    if let Some(build) = args.watch {
        return watch_build(&client, build, &settings).await;
    }
    if args.envs {
        return list_environments(&client).await;
    }

    let env = resolve_environment(&args, &settings)?;
    if args.status {
        return print_status(&client, &env).await;
    }

    let strategy = if args.staged {
        ApplyStrategy::Staged
    } else {
        ApplyStrategy::AtomicSpec
    };
    let mut panel = PkgPanel::new(strategy, settings.search_debounce(), settings.poll_interval());
    panel.change_environment(Some(env));

    if let Some(term) = &args.search {
        return run_search(&mut panel, &client, term).await;
    }
    if args.update_all {
        return run_update_all(&mut panel, &client, args.yes).await;
    }
    if !args.remove.is_empty() || !args.update.is_empty() || !args.install.is_empty() {
        return run_apply(&mut panel, &client, &args).await;
    }
    run_list(&mut panel, &client, &args).await
}

/// Resolve the target environment from flags and settings.
fn resolve_environment(args: &Args, settings: &Settings) -> Result<EnvironmentRef> {
    let namespace = args
        .namespace
        .clone()
        .unwrap_or_else(|| settings.namespace.clone());
    let name = args.env.clone().unwrap_or_else(|| settings.environment.clone());
    if name.is_empty() {
        return Err("no environment given; pass --env or set one in settings".into());
    }
    Ok(EnvironmentRef::new(namespace, name))
}

/// Poll a build until it reaches a terminal state, printing transitions.
async fn watch_build(client: &CondaStoreClient, build: u64, settings: &Settings) -> Result<()> {
    println!("watching build {build}");
    let status = final_build_status(client, build, settings.poll_interval(), |s| {
        println!("build {build}: {s}");
    })
    .await?;
    println!("build {build}: {status}");
    Ok(())
}

/// Print the server status and every environment it exposes.
async fn list_environments(client: &CondaStoreClient) -> Result<()> {
    let status = client.server_status().await?;
    println!("server: {status}");
    for env in client.list_environments().await? {
        println!("{env}");
    }
    Ok(())
}

/// Print the status of the environment's most recent build.
async fn print_status(client: &CondaStoreClient, env: &EnvironmentRef) -> Result<()> {
    match client.current_build_status(env).await? {
        Some(status) => println!("{env}: {status}"),
        None => println!("{env}: no builds"),
    }
    Ok(())
}

/// Load the catalog, run one debounced search, and print the matches.
async fn run_search(
    panel: &mut PkgPanel,
    client: &CondaStoreClient,
    term: &str,
) -> Result<()> {
    if let Err(e) = panel.refresh(client).await {
        warn!(error = %e, "catalog refresh before search failed");
    }
    let Some(ticket) = panel.begin_search(term) else {
        return Ok(());
    };
    panel.resolve_search(client, ticket).await?;
    let rows = panel.visible_rows();
    if rows.is_empty() {
        println!("no packages match '{term}'");
    } else {
        print_rows(&rows);
    }
    Ok(())
}

/// Refresh (optionally reindexing first) and print the filtered listing.
async fn run_list(panel: &mut PkgPanel, client: &CondaStoreClient, args: &Args) -> Result<()> {
    let outcome = if args.refresh {
        panel.refresh_available_packages(client).await?
    } else {
        panel.refresh(client).await?
    };
    if let crate::panel::CatalogOutcome::NotReady(status) = outcome {
        println!("environment build is {status}; packages unavailable");
        return Ok(());
    }
    while panel.state.catalog_has_more {
        panel.load_more(client).await?;
    }
    let filter = PkgFilter::from_config_key(&args.filter)
        .ok_or_else(|| format!("unknown filter '{}'", args.filter))?;
    panel.handle_category_changed(filter);
    print_rows(&panel.visible_rows());
    Ok(())
}

/// Stage the requested removals, updates, and installs as pending entries,
/// then apply them.
async fn run_apply(panel: &mut PkgPanel, client: &CondaStoreClient, args: &Args) -> Result<()> {
    if let crate::panel::CatalogOutcome::NotReady(status) = panel.refresh(client).await? {
        return Err(format!("environment build is {status}; cannot apply changes").into());
    }

    for name in &args.remove {
        match panel.state.catalog.iter().find(|p| &p.name == name).cloned() {
            Some(pkg) => panel.handle_version_selection(&pkg, PkgSelection::Remove),
            None => warn!(name, "not installed, skipping removal"),
        }
    }
    for name in &args.update {
        match panel.state.catalog.iter().find(|p| &p.name == name).cloned() {
            Some(pkg) if pkg.updatable => {
                panel.handle_version_selection(&pkg, PkgSelection::Latest);
            }
            Some(_) => warn!(name, "already at the newest known version, skipping"),
            None => warn!(name, "not installed, skipping update"),
        }
    }
    for atom in &args.install {
        let (name, selection) = match atom.split_once('=') {
            Some((name, version)) => (name, PkgSelection::Pin(version.to_string())),
            None => (atom.as_str(), PkgSelection::Latest),
        };
        let pkg = panel
            .state
            .catalog
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .unwrap_or_else(|| Package {
                name: name.to_string(),
                ..Default::default()
            });
        panel.handle_version_selection(&pkg, selection);
    }

    if panel.state.pending.is_empty() {
        println!("nothing to do");
        return Ok(());
    }
    print_rows(&panel.visible_rows_selected());
    apply_with_prompt(panel, client, args.yes).await
}

/// Confirmed update of every package in the environment.
async fn run_update_all(
    panel: &mut PkgPanel,
    client: &CondaStoreClient,
    assume_yes: bool,
) -> Result<()> {
    if assume_yes {
        panel.update_all(client, &AssumeYes, &CliNotify).await?;
    } else {
        panel.update_all(client, &StdinPrompt, &CliNotify).await?;
    }
    Ok(())
}

/// Apply the pending set with the right prompt for `--yes`.
async fn apply_with_prompt(
    panel: &mut PkgPanel,
    client: &CondaStoreClient,
    assume_yes: bool,
) -> Result<()> {
    if assume_yes {
        panel.apply_pending(client, &AssumeYes, &CliNotify).await?;
    } else {
        panel.apply_pending(client, &StdinPrompt, &CliNotify).await?;
    }
    Ok(())
}

impl PkgPanel {
    /// Rows of the pending set only, for the pre-apply summary.
    fn visible_rows_selected(&self) -> Vec<PkgRow> {
        crate::logic::apply_filter(&self.visible_rows(), PkgFilter::Selected, &self.state.pending)
    }
}

/// Print rows as a fixed-width table.
fn print_rows(rows: &[PkgRow]) {
    for row in rows {
        let installed = row.package.version_installed.as_deref().unwrap_or("-");
        let newest = row.package.newest_available().unwrap_or("-");
        let marker = if row.package.updatable { "*" } else { " " };
        println!(
            "{:<30} {:<12} {:<12}{} {:<10} {}",
            row.package.name, installed, newest, marker, row.selection, row.package.summary
        );
    }
}
