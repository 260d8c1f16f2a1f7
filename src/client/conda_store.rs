//! conda-store REST client.
//!
//! Implements [`CatalogClient`] against the conda-store server API (`/api/v1`).
//! The service's consistency model is "rebuild the whole environment": every
//! mutating call reconstructs the environment's specification and submits it
//! to `/specification/`, which schedules an asynchronous build.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::client::{CatalogClient, PageOf, Result};
use crate::state::{BuildId, BuildStatus, EnvironmentRef, Package};
use crate::util::percent_encode;

/// Paginated wire envelope used by listing endpoints.
#[derive(Debug, serde::Deserialize)]
struct Paginated<T> {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    data: Option<Vec<T>>,
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    size: Option<u64>,
}

/// Single-object wire envelope (`{"data": ...}`).
#[derive(Debug, serde::Deserialize)]
struct Enveloped<T> {
    data: T,
}

/// One package row as returned by the service.
#[derive(Debug, Default, serde::Deserialize)]
struct WirePackage {
    name: String,
    version: String,
    #[serde(default)]
    summary: Option<String>,
}

/// Environment record; only the current build id is interesting here.
#[derive(Debug, Default, serde::Deserialize)]
struct WireEnvironment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<WireNamespace>,
    #[serde(default)]
    current_build_id: Option<BuildId>,
}

#[derive(Debug, serde::Deserialize)]
struct WireNamespace {
    name: String,
}

/// Build record with its originating specification.
#[derive(Debug, serde::Deserialize)]
struct WireBuild {
    status: BuildStatus,
    #[serde(default)]
    specification: Option<WireSpecification>,
}

#[derive(Debug, serde::Deserialize)]
struct WireSpecification {
    spec: SpecDocument,
}

/// Response of a specification submission.
#[derive(Debug, serde::Deserialize)]
struct WireBuildHandle {
    build_id: BuildId,
}

/// The YAML environment specification document.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SpecDocument {
    name: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// JSON body of `POST /specification/`; `specification` carries the YAML
/// document as a string.
#[derive(Debug, serde::Serialize)]
struct SpecRequest {
    namespace: String,
    specification: String,
}

/// Client for one conda-store server.
#[derive(Debug, Clone)]
pub struct CondaStoreClient {
    base_url: String,
    page_size: u64,
    http: reqwest::Client,
}

impl CondaStoreClient {
    /// Build a client for `base_url` (e.g. `http://localhost:5000`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, page_size: u64) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
            http: reqwest::Client::new(),
        }
    }

    /// Compose a full endpoint URL under the `/api/v1` prefix.
    fn api_url(&self, rest: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, rest.trim_start_matches('/'))
    }

    /// GET a JSON document, treating non-2xx statuses as errors.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("unexpected response {status} from {url}").into());
        }
        Ok(resp.json::<T>().await?)
    }

    /// What: Check the conda-store server is reachable.
    ///
    /// Inputs: none
    ///
    /// Output: Server-reported status string (usually `"ok"`).
    pub async fn server_status(&self) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct ServerStatus {
            #[serde(default)]
            status: Option<String>,
        }
        let url = self.api_url("/");
        let s: ServerStatus = self.get_json(&url).await?;
        Ok(s.status.unwrap_or_else(|| "unknown".to_string()))
    }

    /// What: List environments visible to the server.
    ///
    /// Inputs: none
    ///
    /// Output: Environment references across all pages.
    pub async fn list_environments(&self) -> Result<Vec<EnvironmentRef>> {
        let mut out = Vec::new();
        let mut page = 1u64;
        loop {
            let url = self.api_url(&format!(
                "environment/?page={page}&size={}",
                self.page_size
            ));
            let body: Paginated<WireEnvironment> = self.get_json(&url).await?;
            let has_more = more_pages(&body);
            let data = body.data.unwrap_or_default();
            for env in &data {
                if let (Some(ns), Some(name)) = (&env.namespace, &env.name) {
                    out.push(EnvironmentRef::new(ns.name.clone(), name.clone()));
                }
            }
            if !has_more {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    /// Current build id of an environment, if it has ever been built.
    async fn current_build_id(&self, env: &EnvironmentRef) -> Result<Option<BuildId>> {
        let url = self.api_url(&format!("environment/{}/{}/", env.namespace, env.name));
        let body: Enveloped<WireEnvironment> = self.get_json(&url).await?;
        Ok(body.data.current_build_id)
    }

    /// Fetch a build record.
    async fn fetch_build(&self, build: BuildId) -> Result<WireBuild> {
        let url = self.api_url(&format!("build/{build}/"));
        let body: Enveloped<WireBuild> = self.get_json(&url).await?;
        Ok(body.data)
    }

    /// One page of the available-package index, distinct on name and
    /// version, sorted by name.
    async fn fetch_available_page(
        &self,
        page: u64,
        search: &str,
        exact: bool,
    ) -> Result<Paginated<WirePackage>> {
        let mut rest = format!(
            "package/?page={page}&size={}&distinct_on=name&distinct_on=version&sort_by=name",
            self.page_size
        );
        if !search.is_empty() {
            rest.push_str("&search=");
            rest.push_str(&percent_encode(search));
        }
        if exact {
            rest.push_str("&exact=1");
        }
        let url = self.api_url(&rest);
        self.get_json(&url).await
    }

    /// All available rows matching a search term, across pages.
    async fn fetch_all_available(&self, search: &str, exact: bool) -> Result<Vec<WirePackage>> {
        let mut rows = Vec::new();
        let mut page = 1u64;
        loop {
            let body = self.fetch_available_page(page, search, exact).await?;
            let more = more_pages(&body);
            rows.extend(body.data.unwrap_or_default());
            if !more {
                break;
            }
            page += 1;
        }
        Ok(rows)
    }

    /// What: Submit a specification for an environment, scheduling a build.
    ///
    /// Inputs:
    /// - `env`: Target environment (namespace + spec name)
    /// - `dependencies`: Dependency atoms (`name` or `name=version`)
    ///
    /// Output: Handle of the scheduled build.
    ///
    /// Details:
    /// - The document is YAML-encoded and shipped as a string inside a JSON
    ///   body, matching the server's `POST /specification/` contract.
    pub async fn specify(&self, env: &EnvironmentRef, dependencies: &[String]) -> Result<BuildId> {
        let document = SpecDocument {
            name: env.name.clone(),
            dependencies: dependencies.to_vec(),
        };
        let body = SpecRequest {
            namespace: env.namespace.clone(),
            specification: serde_norway::to_string(&document)?,
        };
        let url = self.api_url("specification/");
        info!(env = %env, deps = dependencies.len(), "submitting specification");
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(env = %env, %status, "specification rejected");
            return Err(format!("specification rejected with {status}: {text}").into());
        }
        let handle: Enveloped<WireBuildHandle> = resp.json().await?;
        Ok(handle.data.build_id)
    }
}

/// Whether a paginated envelope indicates further pages.
fn more_pages<T>(body: &Paginated<T>) -> bool {
    match (body.page, body.size, body.count) {
        (Some(page), Some(size), Some(count)) => page.saturating_mul(size) < count,
        _ => false,
    }
}

/// Aggregate distinct name/version rows into catalog packages. Rows arrive
/// sorted by name; versions keep catalog order (newest last).
fn aggregate_rows(rows: Vec<WirePackage>) -> Vec<Package> {
    let mut out: Vec<Package> = Vec::new();
    for row in rows {
        match out.last_mut() {
            Some(last) if last.name == row.name => {
                if !last.versions_available.contains(&row.version) {
                    last.versions_available.push(row.version);
                }
                if last.summary.is_empty() {
                    last.summary = row.summary.unwrap_or_default();
                }
            }
            _ => out.push(Package {
                name: row.name,
                versions_available: vec![row.version],
                version_installed: None,
                summary: row.summary.unwrap_or_default(),
                updatable: false,
            }),
        }
    }
    out
}

impl CatalogClient for CondaStoreClient {
    async fn list_installed(&self, env: &EnvironmentRef, page: u64) -> Result<PageOf<Package>> {
        let Some(build) = self.current_build_id(env).await? else {
            return Ok(PageOf::default());
        };
        let url = self.api_url(&format!(
            "build/{build}/packages/?page={page}&size={}&sort_by=name",
            self.page_size
        ));
        let body: Paginated<WirePackage> = self.get_json(&url).await?;
        let has_more = more_pages(&body);
        let items = body
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|row| Package {
                name: row.name,
                versions_available: vec![row.version.clone()],
                version_installed: Some(row.version),
                summary: row.summary.unwrap_or_default(),
                updatable: false,
            })
            .collect();
        Ok(PageOf { items, has_more })
    }

    async fn search(&self, term: &str) -> Result<Vec<Package>> {
        let rows = self.fetch_all_available(term, false).await?;
        Ok(aggregate_rows(rows))
    }

    async fn available_versions(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let mut out = BTreeMap::new();
        for name in names {
            let rows = self.fetch_all_available(name, true).await?;
            let versions: Vec<String> = rows
                .into_iter()
                .filter(|r| r.name == *name)
                .map(|r| r.version)
                .collect();
            if !versions.is_empty() {
                out.insert(name.clone(), versions);
            }
        }
        Ok(out)
    }

    async fn remove(&self, env: &EnvironmentRef, names: &[String]) -> Result<BuildId> {
        let current = self.specified_dependencies(env).await?;
        let next: Vec<String> = current
            .into_iter()
            .filter(|atom| {
                let name = atom.split_once('=').map_or(atom.as_str(), |(n, _)| n);
                !names.iter().any(|n| n == name)
            })
            .collect();
        self.specify(env, &next).await
    }

    async fn update(&self, env: &EnvironmentRef, names: &[String]) -> Result<BuildId> {
        let current = self.specified_dependencies(env).await?;
        let next: Vec<String> = current
            .into_iter()
            .map(|atom| {
                let name = atom.split_once('=').map_or(atom.as_str(), |(n, _)| n);
                if names.iter().any(|n| n == name) {
                    // Unpinned, so the solver picks the newest version.
                    name.to_string()
                } else {
                    atom
                }
            })
            .collect();
        self.specify(env, &next).await
    }

    async fn update_all(&self, env: &EnvironmentRef) -> Result<BuildId> {
        let current = self.specified_dependencies(env).await?;
        let next: Vec<String> = current
            .into_iter()
            .map(|atom| {
                atom.split_once('=')
                    .map_or(atom.clone(), |(n, _)| n.to_string())
            })
            .collect();
        self.specify(env, &next).await
    }

    async fn install(&self, env: &EnvironmentRef, specs: &[String]) -> Result<BuildId> {
        let current = self.specified_dependencies(env).await?;
        let plan = crate::logic::ActionPlan {
            to_install: specs.to_vec(),
            ..Default::default()
        };
        let next = crate::logic::plan::merge_spec(&current, &plan);
        self.specify(env, &next).await
    }

    async fn submit_spec(&self, env: &EnvironmentRef, dependencies: &[String]) -> Result<BuildId> {
        self.specify(env, dependencies).await
    }

    async fn specified_dependencies(&self, env: &EnvironmentRef) -> Result<Vec<String>> {
        let Some(build) = self.current_build_id(env).await? else {
            return Ok(Vec::new());
        };
        let record = self.fetch_build(build).await?;
        Ok(record
            .specification
            .map(|s| s.spec.dependencies)
            .unwrap_or_default())
    }

    async fn poll_build_status(&self, build: BuildId) -> Result<BuildStatus> {
        Ok(self.fetch_build(build).await?.status)
    }

    async fn current_build_status(&self, env: &EnvironmentRef) -> Result<Option<BuildStatus>> {
        match self.current_build_id(env).await? {
            Some(build) => Ok(Some(self.fetch_build(build).await?.status)),
            None => Ok(None),
        }
    }

    async fn refresh_available_packages(&self) -> Result<()> {
        // The service has no dedicated invalidation endpoint; requesting the
        // first index page re-primes its package cache.
        let _ = self.fetch_available_page(1, "", false).await?;
        Ok(())
    }
}
