//! Kustomization sources
//!
//! Values files double as kustomize option documents: `images`, `namePrefix`, `nameSuffix`
//! and `namespace` keys are turned into `kustomize edit set ...` calls before the overlay is
//! built into a single manifest under `templates/`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{ChartifyError, Result};
use crate::pipeline::Pipeline;

/// File the built kustomization lands in, relative to `templates/`
pub const KUSTOMIZED_FILE: &str = "kustomized.yaml";

/// An `images:` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KustomizeImage {
    pub name: String,
    pub new_name: String,
    pub new_tag: String,
    pub digest: String,
}

impl fmt::Display for KustomizeImage {
    /// `name[=newName][:newTag][@digest]`, the form `kustomize edit set image` accepts
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.new_name.is_empty() {
            write!(f, "={}", self.new_name)?;
        }
        if !self.new_tag.is_empty() {
            write!(f, ":{}", self.new_tag)?;
        }
        if !self.digest.is_empty() {
            write!(f, "@{}", self.digest)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KustomizeOpts {
    pub images: Vec<KustomizeImage>,
    pub name_prefix: String,
    pub name_suffix: String,
    pub namespace: String,
}

impl KustomizeOpts {
    /// Parse one values document, ignoring keys that are not kustomize options
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let doc: serde_yaml::Value = serde_yaml::from_str(content)?;
        if doc.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(doc)
    }

    /// Read and merge the options of several values files, later files winning
    pub fn load(files: &[PathBuf]) -> Result<Self> {
        let mut opts = Self::default();
        for file in files {
            let content = fs::read_to_string(file)?;
            let parsed =
                Self::from_yaml(&content).map_err(|e| ChartifyError::InvalidKustomizeOpts {
                    file: file.clone(),
                    message: e.to_string(),
                })?;
            opts.merge(parsed);
        }
        Ok(opts)
    }

    /// Overlay the non-empty fields of `other`
    pub fn merge(&mut self, other: KustomizeOpts) {
        if !other.images.is_empty() {
            self.images = other.images;
        }
        if !other.name_prefix.is_empty() {
            self.name_prefix = other.name_prefix;
        }
        if !other.name_suffix.is_empty() {
            self.name_suffix = other.name_suffix;
        }
        if !other.namespace.is_empty() {
            self.namespace = other.namespace;
        }
    }

    /// `kustomize` argument lists, in the order images, prefix, suffix, namespace
    pub fn edit_args(&self) -> Vec<Vec<String>> {
        let set = |what: &str| vec!["edit".to_string(), "set".to_string(), what.to_string()];
        let mut commands = Vec::new();

        if !self.images.is_empty() {
            let mut args = set("image");
            args.extend(self.images.iter().map(ToString::to_string));
            commands.push(args);
        }
        if !self.name_prefix.is_empty() {
            let mut args = set("nameprefix");
            args.push(self.name_prefix.clone());
            commands.push(args);
        }
        if !self.name_suffix.is_empty() {
            // `--` keeps a leading dash in the suffix from being read as a flag
            let mut args = set("namesuffix");
            args.push("--".to_string());
            args.push(self.name_suffix.clone());
            commands.push(args);
        }
        if !self.namespace.is_empty() {
            let mut args = set("namespace");
            args.push(self.namespace.clone());
            commands.push(args);
        }

        commands
    }
}

impl Pipeline<'_> {
    /// Apply kustomize options from the values files, then build the overlay into
    /// `templates/kustomized.yaml`
    pub fn kustomize_build(&self) -> Result<Vec<PathBuf>> {
        let root = self.root();
        let opts = KustomizeOpts::load(&self.options().values.values_files)?;

        for args in opts.edit_args() {
            self.runner()
                .run(&self.kustomize().args(args).current_dir(root))?;
        }

        let templates = root.join("templates");
        fs::create_dir_all(&templates)?;
        let output = templates.join(KUSTOMIZED_FILE);
        self.build_overlay(root, &output)?;

        info!(output = %output.display(), "built kustomization");
        Ok(vec![output])
    }

    /// `kustomize build <dir> --output <file>`
    pub(crate) fn build_overlay(&self, dir: &Path, output: &Path) -> Result<()> {
        self.runner().run(
            &self
                .kustomize()
                .arg("build")
                .arg_path(dir)
                .arg("--output")
                .arg_path(output),
        )?;
        Ok(())
    }
}
