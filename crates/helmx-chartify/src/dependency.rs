//! Dependency flattening
//!
//! Ad-hoc dependencies are resolved against `helm repo list` and appended to
//! `requirements.yaml`. After `helm dependency build`, every fetched sub-chart archive is
//! unpacked and rendered in place, then the requirements files are removed so nothing
//! re-resolves them later.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use helmx_core::{Requirement, Requirements, untar};
use tracing::{debug, info};

use crate::error::{ChartifyError, Result};
use crate::pipeline::Pipeline;

/// `ALIAS=REPO/CHART:VERSION`, with alias and version optional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdhocDependency {
    pub alias: String,
    pub repo: String,
    pub chart: String,
    pub version: String,
}

impl FromStr for AdhocDependency {
    type Err = ChartifyError;

    fn from_str(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| ChartifyError::InvalidDependency {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (alias, chart_ref) = match spec.split_once('=') {
            Some((alias, rest)) => (Some(alias), rest),
            None => (None, spec),
        };
        if chart_ref.contains('=') {
            return Err(invalid("more than one '='"));
        }

        let (repo_chart, version) = match chart_ref.split_once(':') {
            Some((repo_chart, version)) => (repo_chart, version),
            None => (chart_ref, "*"),
        };
        let (repo, chart) = repo_chart
            .split_once('/')
            .ok_or_else(|| invalid("missing REPO/ prefix"))?;

        if repo.is_empty() || chart.is_empty() || chart.contains('/') {
            return Err(invalid("expected exactly one REPO/CHART pair"));
        }
        if version.is_empty() {
            return Err(invalid("empty version"));
        }
        let alias = match alias {
            Some("") => return Err(invalid("empty alias")),
            Some(alias) => alias,
            None => chart,
        };

        Ok(Self {
            alias: alias.to_string(),
            repo: repo.to_string(),
            chart: chart.to_string(),
            version: version.to_string(),
        })
    }
}

impl AdhocDependency {
    /// The `requirements.yaml` entry, enabled by `<alias>.enabled`
    pub fn to_requirement(&self, repository: &str) -> Requirement {
        Requirement {
            name: self.chart.clone(),
            repository: repository.to_string(),
            version: self.version.clone(),
            alias: Some(self.alias.clone()),
            condition: Some(format!("{}.enabled", self.alias)),
            extra: BTreeMap::new(),
        }
    }
}

/// Repository name to URL, as printed by `helm repo list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoTable(BTreeMap<String, String>);

impl RepoTable {
    /// Parse `helm repo list` output: a header line, then `NAME URL` columns
    pub fn parse(output: &str) -> Result<Self> {
        let mut repos = BTreeMap::new();
        for (index, line) in output.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let mut columns = line.split_whitespace();
            match (columns.next(), columns.next()) {
                (Some(name), Some(url)) => {
                    repos.insert(name.to_string(), url.to_string());
                }
                _ => {
                    return Err(ChartifyError::RepoListFormat {
                        line: index + 1,
                        content: line.to_string(),
                    });
                }
            }
        }
        Ok(Self(repos))
    }

    pub fn url(&self, repo: &str) -> Option<&str> {
        self.0.get(repo).map(String::as_str)
    }

    /// Resolve every dependency, failing on the first unknown repository
    pub fn resolve(&self, dependencies: &[AdhocDependency]) -> Result<Vec<Requirement>> {
        dependencies
            .iter()
            .map(|dep| {
                let url = self
                    .url(&dep.repo)
                    .ok_or_else(|| ChartifyError::RepositoryNotFound {
                        repo: dep.repo.clone(),
                    })?;
                Ok(dep.to_requirement(url))
            })
            .collect()
    }
}

/// `charts/*-*.tgz` archives, sorted
fn subchart_archives(chart_dir: &Path) -> Result<Vec<PathBuf>> {
    let charts = chart_dir.join("charts");
    if !charts.is_dir() {
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();
    for entry in fs::read_dir(&charts)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if path.is_file() && name.ends_with(".tgz") && name.contains('-') {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

impl Pipeline<'_> {
    /// Merge ad-hoc dependencies into `requirements.yaml`, build them, and render every
    /// fetched sub-chart into plain manifest files
    pub fn flatten_dependencies(&self, adhoc: &[AdhocDependency]) -> Result<Vec<PathBuf>> {
        let root = self.root();
        let mut requirements = Requirements::load(root)?;

        if !adhoc.is_empty() {
            let repos = RepoTable::parse(&self.helm().repo_list(self.runner())?)?;
            requirements.dependencies.extend(repos.resolve(adhoc)?);
        }

        if !requirements.is_empty() {
            requirements.save(root)?;
            info!(count = requirements.dependencies.len(), "building chart dependencies");
            self.helm().dependency_build(self.runner(), root)?;
        }

        let mut files = Vec::new();
        for archive in subchart_archives(root)? {
            debug!(archive = %archive.display(), "unpacking sub-chart");
            let subchart = untar(&archive, &root.join("charts"))?;
            files.extend(self.render_templates(&subchart)?);
        }

        Requirements::remove(root)?;
        Ok(files)
    }
}
