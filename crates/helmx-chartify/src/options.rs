//! Chartify configuration

use std::path::PathBuf;

use helmx_core::ValueArgs;

/// Everything that shapes a chartify run
#[derive(Debug, Clone, Default)]
pub struct ChartifyOptions {
    /// `--set`, `-f` and `--namespace`, used for rendering
    pub values: ValueArgs,

    /// Version of the synthesized chart, or of the remote chart to fetch
    pub chart_version: Option<String>,

    /// Pass `--debug` to helm when rendering
    pub debug: bool,

    /// Legacy injector descriptors: `"<cmd> [sub],flag=value,..."`
    pub injectors: Vec<String>,

    /// Injector command templates containing `FILE`
    pub injects: Vec<String>,

    /// `ALIAS=REPO/CHART:VERSION` references
    pub adhoc_dependencies: Vec<String>,

    pub json_patches: Vec<PathBuf>,
    pub strategic_merge_patches: Vec<PathBuf>,
}

impl ChartifyOptions {
    pub fn new(values: ValueArgs) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    pub fn chart_version(mut self, version: Option<String>) -> Self {
        self.chart_version = version.filter(|v| !v.is_empty());
        self
    }

    pub fn has_patches(&self) -> bool {
        !self.json_patches.is_empty() || !self.strategic_merge_patches.is_empty()
    }
}
