//! Dump command - print the latest stored record of a release

use std::io::Write;

use chrono::{DateTime, Utc};
use clap::Args;
use helmx_core::CommandRunner;
use helmx_release::{HookEvent, Release, ReleaseError, ReleaseStore, event_name};
use prost_types::Timestamp;
use serde::Serialize;

use super::{KubeArgs, ToolArgs};
use crate::error::Result;
use crate::exit_codes;

#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    /// Release name
    pub release: String,

    #[command(flatten)]
    pub kube: KubeArgs,
}

#[derive(Debug, Serialize)]
struct HookSummary {
    name: String,
    kind: String,
    path: String,
    events: Vec<&'static str>,
    weight: i32,
}

/// Everything but the manifest, which is printed raw afterwards
#[derive(Debug, Serialize)]
struct ReleaseSummary {
    name: String,
    namespace: String,
    version: i32,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_deployed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_deployed: Option<String>,
    description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hooks: Vec<HookSummary>,
}

fn rfc3339(ts: Option<&Timestamp>) -> Option<String> {
    let ts = ts?;
    DateTime::<Utc>::from_timestamp(ts.seconds, u32::try_from(ts.nanos).unwrap_or_default())
        .map(|t| t.to_rfc3339())
}

impl From<&Release> for ReleaseSummary {
    fn from(release: &Release) -> Self {
        let info = release.info.as_ref();
        Self {
            name: release.name.clone(),
            namespace: release.namespace.clone(),
            version: release.version,
            status: release.status_code().label(),
            chart: release
                .chart_metadata()
                .map(|m| format!("{}-{}", m.name, m.version)),
            first_deployed: rfc3339(info.and_then(|i| i.first_deployed.as_ref())),
            last_deployed: rfc3339(info.and_then(|i| i.last_deployed.as_ref())),
            description: info.map(|i| i.description.clone()).unwrap_or_default(),
            hooks: release
                .hooks
                .iter()
                .map(|hook| HookSummary {
                    name: hook.name.clone(),
                    kind: hook.kind.clone(),
                    path: hook.path.clone(),
                    events: hook
                        .events
                        .iter()
                        .map(|e| event_name(HookEvent::try_from(*e).unwrap_or(HookEvent::Unknown)))
                        .collect(),
                    weight: hook.weight,
                })
                .collect(),
        }
    }
}

/// Summary YAML followed by `manifest:` and the raw manifest
pub fn render(release: &Release) -> std::result::Result<String, ReleaseError> {
    let summary = serde_yaml::to_string(&ReleaseSummary::from(release))?;
    Ok(format!("{summary}\nmanifest:\n{}", release.manifest))
}

pub fn run(
    runner: &dyn CommandRunner,
    tools: &ToolArgs,
    args: &DumpArgs,
    out: &mut dyn Write,
) -> Result<i32> {
    let store = ReleaseStore::new(runner, args.kube.store_config(tools));
    let release = store.latest(&args.release)?;
    write!(out, "{}", render(&release)?)?;
    Ok(exit_codes::SUCCESS)
}
