use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::config::Action;
use crate::errors::{BatchError, BatchResult};
use crate::results::{ActionPlan, Match};

/// Computes where every match goes. Pure path arithmetic, no filesystem access.
#[derive(Debug, Clone)]
pub struct ActionPlanner {
    action: Action,
    destination_root: Option<PathBuf>,
    preserve_structure: bool,
}

impl ActionPlanner {
    pub fn new(action: Action, destination_root: Option<PathBuf>, preserve_structure: bool) -> Self {
        Self {
            action,
            destination_root,
            preserve_structure,
        }
    }

    /// One plan per match, in match order. Search-only runs produce no plans.
    ///
    /// Colliding destinations are left as they are; the executor overwrites.
    pub fn plan(&self, matches: &[Match]) -> BatchResult<Vec<ActionPlan>> {
        let plans = match self.action {
            Action::None => Vec::new(),
            Action::Delete => matches
                .iter()
                .map(|m| ActionPlan {
                    source: m.clone(),
                    action: Action::Delete,
                    destination: None,
                })
                .collect(),
            Action::Copy | Action::Move => {
                let root = self.destination_root.as_deref().ok_or_else(|| {
                    BatchError::config_error(format!("{} requires a destination root", self.action))
                })?;
                let base = if self.preserve_structure {
                    common_ancestor(matches.iter().map(|m| m.path.as_path()))
                } else {
                    None
                };

                matches
                    .iter()
                    .map(|m| ActionPlan {
                        source: m.clone(),
                        action: self.action,
                        destination: Some(root.join(self.relative_destination(&m.path, base.as_deref()))),
                    })
                    .collect()
            }
        };

        debug!("Planned {} {} operations", plans.len(), self.action);
        Ok(plans)
    }

    fn relative_destination(&self, source: &Path, base: Option<&Path>) -> PathBuf {
        if !self.preserve_structure {
            return source
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| normal_components(source));
        }
        match base.and_then(|base| source.strip_prefix(base).ok()) {
            Some(relative) => normal_components(relative),
            // no shared folder: replicate from the drive/filesystem root
            None => normal_components(source),
        }
    }
}

/// Keeps only plain names, dropping drive prefixes, roots and `.`/`..`
fn normal_components(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Deepest folder containing every source, `None` when the only thing shared is a
/// filesystem root or drive
pub(crate) fn common_ancestor<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    let mut shared: Option<Vec<Component<'a>>> = None;
    for path in paths {
        let parent: Vec<Component<'a>> = path.parent()?.components().collect();
        shared = Some(match shared {
            None => parent,
            Some(prev) => prev
                .into_iter()
                .zip(parent)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }

    let shared = shared?;
    if !shared.iter().any(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(shared.into_iter().collect())
}
