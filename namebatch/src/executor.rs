use dashmap::DashSet;
use rayon::prelude::*;
use std::fs::{self, FileTimes, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

use crate::config::Action;
use crate::context::BatchContext;
use crate::report::{Phase, ProgressEvent};
use crate::results::{ActionPlan, ActionResult, Outcome};

/// Reason recorded when a cross-device move copied the data but could not remove the source
pub const SOURCE_CLEANUP_FAILED: &str = "source cleanup failed";

#[cfg(unix)]
const CROSS_DEVICE_ERROR: Option<i32> = Some(18); // EXDEV
#[cfg(windows)]
const CROSS_DEVICE_ERROR: Option<i32> = Some(17); // ERROR_NOT_SAME_DEVICE
#[cfg(not(any(unix, windows)))]
const CROSS_DEVICE_ERROR: Option<i32> = None;

fn is_cross_device(err: &io::Error) -> bool {
    CROSS_DEVICE_ERROR.is_some() && err.raw_os_error() == CROSS_DEVICE_ERROR
}

/// Performs planned file operations, one `ActionResult` per plan.
///
/// Existing files at a destination are overwritten, so re-running a batch converges on
/// the same output tree. Nothing is retried.
#[derive(Debug, Default)]
pub struct ActionExecutor {
    /// Destination folders already created during this run
    created_dirs: DashSet<PathBuf>,
}

impl ActionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes every plan on the context's worker pool; results keep plan order
    pub fn execute(&self, plans: Vec<ActionPlan>, ctx: &BatchContext<'_>) -> Vec<ActionResult> {
        let total = plans.len();
        info!("Executing {} planned operations", total);

        let results: Vec<ActionResult> = ctx.install(|| {
            plans
                .into_par_iter()
                .map(|plan| {
                    if ctx.cancel.is_cancelled() {
                        return ActionResult {
                            plan,
                            outcome: Outcome::Cancelled,
                        };
                    }

                    let outcome = self.run_plan(&plan);
                    let failed = !outcome.is_success();
                    let completed = ctx.metrics.record_action(!failed);
                    ctx.report(ProgressEvent::Progress {
                        phase: if plan.action == Action::Delete {
                            Phase::Delete
                        } else {
                            Phase::Process
                        },
                        completed,
                        total,
                        item: plan.source.path.display().to_string(),
                        failed,
                    });
                    ActionResult { plan, outcome }
                })
                .collect()
        });

        ctx.metrics.log_stats();
        results
    }

    /// Runs a single plan, turning every error into `Outcome::Failed`
    pub fn run_plan(&self, plan: &ActionPlan) -> Outcome {
        let source = plan.source.path.as_path();
        let outcome = match (plan.action, plan.destination.as_deref()) {
            (Action::Delete, _) => fs::remove_file(source)
                .map(|_| Outcome::Success)
                .unwrap_or_else(|e| Outcome::failed(format!("delete failed: {}", e))),
            (Action::Copy, Some(dest)) => match self.ensure_parent(dest) {
                Ok(()) => copy_file(source, dest)
                    .map(|_| Outcome::Success)
                    .unwrap_or_else(|e| Outcome::failed(format!("copy failed: {}", e))),
                Err(e) => Outcome::failed(format!("create directory failed: {}", e)),
            },
            (Action::Move, Some(dest)) => match self.ensure_parent(dest) {
                Ok(()) => move_file(source, dest),
                Err(e) => Outcome::failed(format!("create directory failed: {}", e)),
            },
            (Action::Copy | Action::Move, None) => Outcome::failed("no destination planned"),
            (Action::None, _) => Outcome::failed("no action selected"),
        };

        match &outcome {
            Outcome::Failed(reason) => {
                warn!("{} {} failed: {}", plan.action, source.display(), reason)
            }
            _ => trace!("{} {} done", plan.action, source.display()),
        }
        outcome
    }

    fn ensure_parent(&self, dest: &Path) -> io::Result<()> {
        let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if self.created_dirs.contains(parent) {
            return Ok(());
        }
        fs::create_dir_all(parent)?;
        self.created_dirs.insert(parent.to_path_buf());
        Ok(())
    }
}

/// Copies bytes and permissions, then carries over timestamps where the platform allows
fn copy_file(source: &Path, dest: &Path) -> io::Result<u64> {
    let bytes = fs::copy(source, dest)?;
    if let Err(e) = copy_times(source, dest) {
        debug!("Could not preserve timestamps on {}: {}", dest.display(), e);
    }
    Ok(bytes)
}

fn copy_times(source: &Path, dest: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    OpenOptions::new().write(true).open(dest)?.set_times(times)
}

/// Renames in place, falling back to copy-then-delete across devices
fn move_file(source: &Path, dest: &Path) -> Outcome {
    match fs::rename(source, dest) {
        Ok(()) => Outcome::Success,
        Err(e) if is_cross_device(&e) => {
            debug!(
                "{} and {} are on different devices, copying instead",
                source.display(),
                dest.display()
            );
            relocate_via_copy(source, dest)
        }
        Err(e) => Outcome::failed(format!("move failed: {}", e)),
    }
}

/// Copy then delete. A failed delete is reported even though the data already arrived.
pub(crate) fn relocate_via_copy(source: &Path, dest: &Path) -> Outcome {
    if let Err(e) = copy_file(source, dest) {
        return Outcome::failed(format!("move failed: {}", e));
    }
    match fs::remove_file(source) {
        Ok(()) => Outcome::Success,
        Err(e) => {
            warn!(
                "{} was copied to {} but could not be removed: {}",
                source.display(),
                dest.display(),
                e
            );
            Outcome::failed(format!("{}: {}", SOURCE_CLEANUP_FAILED, e))
        }
    }
}
