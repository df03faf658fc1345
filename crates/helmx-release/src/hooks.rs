//! Hook extraction from rendered manifests
//!
//! Every document of a rendered manifest starts with a `# Source: <chart>/templates/<file>`
//! line. Documents annotated with `helm.sh/hook` become release hooks; the rest stay in the
//! release manifest.

use helmx_core::KubeObject;

use crate::error::{ReleaseError, Result};
use crate::proto::{Hook, HookDeletePolicy, HookEvent};

pub const HOOK_ANNOTATION: &str = "helm.sh/hook";
pub const HOOK_WEIGHT_ANNOTATION: &str = "helm.sh/hook-weight";
pub const HOOK_DELETE_POLICY_ANNOTATION: &str = "helm.sh/hook-delete-policy";

const DOCUMENT_SEPARATOR: &str = "\n---\n";
const SOURCE_MARKER: &str = "Source: ";

const EVENTS: &[(&str, HookEvent)] = &[
    ("pre-install", HookEvent::PreInstall),
    ("post-install", HookEvent::PostInstall),
    ("pre-delete", HookEvent::PreDelete),
    ("post-delete", HookEvent::PostDelete),
    ("pre-upgrade", HookEvent::PreUpgrade),
    ("post-upgrade", HookEvent::PostUpgrade),
    ("pre-rollback", HookEvent::PreRollback),
    ("post-rollback", HookEvent::PostRollback),
    ("test-success", HookEvent::ReleaseTestSuccess),
    ("test-failure", HookEvent::ReleaseTestFailure),
    ("crd-install", HookEvent::CrdInstall),
];

const DELETE_POLICIES: &[(&str, HookDeletePolicy)] = &[
    ("hook-succeeded", HookDeletePolicy::Succeeded),
    ("hook-failed", HookDeletePolicy::Failed),
    ("before-hook-creation", HookDeletePolicy::BeforeHookCreation),
];

/// Recognized `helm.sh/hook` values
pub fn known_events() -> Vec<&'static str> {
    EVENTS.iter().map(|(name, _)| *name).collect()
}

pub fn parse_event(name: &str) -> Option<HookEvent> {
    EVENTS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, event)| *event)
}

/// Annotation value of an event, `unknown` for unnamed ones
pub fn event_name(event: HookEvent) -> &'static str {
    EVENTS
        .iter()
        .find(|(_, known)| *known == event)
        .map_or("unknown", |(name, _)| *name)
}

fn hook_names(annotation: &str) -> impl Iterator<Item = &str> {
    annotation.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn documents(manifest: &str) -> impl Iterator<Item = &str> {
    manifest
        .split(DOCUMENT_SEPARATOR)
        .map(|doc| doc.strip_prefix("---\n").unwrap_or(doc))
        .filter(|doc| !doc.trim().is_empty())
}

/// Split a rendered manifest into the plain resources and the hooks
///
/// The returned manifest keeps each resource document, `# Source:` line included, each preceded
/// by a `---` separator.
pub fn split_manifest_and_hooks(manifest: &str) -> Result<(String, Vec<Hook>)> {
    let mut resources = String::new();
    let mut hooks = Vec::new();

    for doc in documents(manifest) {
        let (header, body) = doc.split_once('\n').unwrap_or((doc, ""));
        let source = match header.split(SOURCE_MARKER).collect::<Vec<_>>().as_slice() {
            [_, source] => source.trim().to_string(),
            _ => {
                return Err(ReleaseError::MissingSource {
                    manifest: doc.to_string(),
                });
            }
        };

        let object = KubeObject::from_yaml(doc)?;
        let Some(annotation) = object.annotation(HOOK_ANNOTATION) else {
            resources.push_str(DOCUMENT_SEPARATOR);
            resources.push_str(doc);
            continue;
        };

        let events = hook_names(annotation)
            .map(|name| {
                parse_event(name)
                    .map(|event| event as i32)
                    .ok_or_else(|| ReleaseError::UnknownHook {
                        hook: name.to_string(),
                        known: known_events(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let name = match object.metadata.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ReleaseError::MissingHookName { path: source }),
        };

        let weight = match object.annotation(HOOK_WEIGHT_ANNOTATION) {
            Some(value) => {
                value
                    .trim()
                    .parse()
                    .map_err(|_| ReleaseError::InvalidHookWeight {
                        name: name.clone(),
                        value: value.to_string(),
                    })?
            }
            None => 0,
        };

        let delete_policies = object
            .annotation(HOOK_DELETE_POLICY_ANNOTATION)
            .map(hook_names)
            .into_iter()
            .flatten()
            .map(|policy| {
                DELETE_POLICIES
                    .iter()
                    .find(|(known, _)| *known == policy)
                    .map(|(_, p)| *p as i32)
                    .ok_or_else(|| ReleaseError::UnknownDeletePolicy {
                        name: name.clone(),
                        policy: policy.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        hooks.push(Hook {
            name,
            kind: object.kind.clone(),
            path: source,
            manifest: body.to_string(),
            events,
            weight,
            delete_policies,
            ..Default::default()
        });
    }

    Ok((resources, hooks))
}

/// Documents annotated with the hook `target`, or with any hook when `target` is `None`
pub fn extract_hook_manifests(manifest: &str, target: Option<&str>) -> Result<Vec<String>> {
    if let Some(target) = target.filter(|t| parse_event(t).is_none()) {
        return Err(ReleaseError::UnknownTarget {
            target: target.to_string(),
            known: known_events(),
        });
    }

    let mut result = Vec::new();
    for doc in documents(manifest) {
        let object = KubeObject::from_yaml(doc)?;
        let Some(annotation) = object.annotation(HOOK_ANNOTATION) else {
            continue;
        };

        let mut matched = false;
        for name in hook_names(annotation) {
            if parse_event(name).is_none() {
                return Err(ReleaseError::UnknownHook {
                    hook: name.to_string(),
                    known: known_events(),
                });
            }
            matched |= target.is_none_or(|t| t == name);
        }
        if matched {
            result.push(doc.to_string());
        }
    }
    Ok(result)
}
