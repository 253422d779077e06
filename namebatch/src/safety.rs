use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Action;
use crate::errors::unify_path;
use crate::results::{ActionPlan, ActionResult, Outcome};

/// Reason recorded for plans touching a protected prefix
pub const PROTECTED_LOCATION: &str = "protected location";

/// Operating-system locations no batch may move, delete or write into
static SYSTEM_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(system_locations);

#[cfg(windows)]
fn system_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    for (var, fallback) in [
        ("SystemRoot", r"C:\Windows"),
        ("ProgramFiles", r"C:\Program Files"),
        ("ProgramFiles(x86)", r"C:\Program Files (x86)"),
        ("ProgramData", r"C:\ProgramData"),
    ] {
        let dir = std::env::var_os(var)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(fallback));
        locations.push(dir);
    }
    locations
}

#[cfg(not(windows))]
fn system_locations() -> Vec<PathBuf> {
    [
        "/bin",
        "/boot",
        "/dev",
        "/etc",
        "/lib",
        "/lib32",
        "/lib64",
        "/proc",
        "/sbin",
        "/sys",
        "/usr",
        "/System",
        "/Library",
        "/private/etc",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

/// Answers the "are you sure?" question for destructive runs
pub trait Confirm: Send + Sync {
    fn confirm(&self, action: Action, count: usize) -> bool;
}

/// A pre-decided answer, e.g. from `--yes`
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _action: Action, _count: usize) -> bool {
        self.0
    }
}

/// Result of gating a set of plans
#[derive(Debug)]
pub enum GateDecision {
    /// The caller did not confirm; nothing may run
    Declined,
    Cleared {
        runnable: Vec<ActionPlan>,
        /// Plans refused for touching a protected location, already resolved
        rejected: Vec<ActionResult>,
    },
}

/// Pre-execution checks: confirmation for Move/Delete and protected prefixes
#[derive(Debug, Clone)]
pub struct SafetyGate {
    protected: Vec<PathBuf>,
}

impl SafetyGate {
    /// System locations, this tool's own configuration folder and `extra`
    pub fn new(extra: &[PathBuf]) -> Self {
        let mut protected = SYSTEM_LOCATIONS.clone();
        if let Some(dir) = dirs::config_dir() {
            protected.push(dir.join("namebatch"));
        }
        protected.extend(extra.iter().cloned());
        Self::with_prefixes(protected)
    }

    /// Exactly `prefixes`, without the built-in locations
    pub fn with_prefixes(prefixes: Vec<PathBuf>) -> Self {
        let mut protected: Vec<PathBuf> = Vec::with_capacity(prefixes.len() * 2);
        for prefix in prefixes {
            let unified = unify_path(&prefix);
            if unified != prefix {
                protected.push(unified);
            }
            protected.push(prefix);
        }
        Self { protected }
    }

    pub fn protected_prefixes(&self) -> &[PathBuf] {
        &self.protected
    }

    /// True if `path` (as given or canonicalized) lies under a protected prefix
    pub fn is_protected(&self, path: &Path) -> bool {
        let unified = unify_path(path);
        self.protected
            .iter()
            .any(|prefix| is_under(path, prefix) || is_under(&unified, prefix))
    }

    fn rejects(&self, plan: &ActionPlan) -> bool {
        let source_matters = plan.action.is_destructive();
        (source_matters && self.is_protected(&plan.source.path))
            || plan
                .destination
                .as_deref()
                .is_some_and(|dest| self.is_protected(dest))
    }

    /// Runs every check before any plan executes
    pub fn check(&self, plans: Vec<ActionPlan>, confirm: &dyn Confirm) -> GateDecision {
        let Some(action) = plans.first().map(|p| p.action) else {
            return GateDecision::Cleared {
                runnable: Vec::new(),
                rejected: Vec::new(),
            };
        };

        if action.is_destructive() && !confirm.confirm(action, plans.len()) {
            info!("{} of {} files was not confirmed", action, plans.len());
            return GateDecision::Declined;
        }

        let (rejected, runnable): (Vec<ActionPlan>, Vec<ActionPlan>) =
            plans.into_iter().partition(|plan| self.rejects(plan));

        for plan in &rejected {
            warn!(
                "Refusing to {} {}: protected location",
                plan.action,
                plan.source.path.display()
            );
        }

        GateDecision::Cleared {
            runnable,
            rejected: rejected
                .into_iter()
                .map(|plan| ActionResult {
                    plan,
                    outcome: Outcome::failed(PROTECTED_LOCATION),
                })
                .collect(),
        }
    }
}

#[cfg(windows)]
fn is_under(path: &Path, prefix: &Path) -> bool {
    let path = PathBuf::from(path.to_string_lossy().to_lowercase());
    let prefix = PathBuf::from(prefix.to_string_lossy().to_lowercase());
    path.starts_with(prefix)
}

#[cfg(not(windows))]
fn is_under(path: &Path, prefix: &Path) -> bool {
    path.starts_with(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Match;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn plan(action: Action, source: &Path, destination: Option<&Path>) -> ActionPlan {
        ActionPlan {
            source: Match {
                query_index: 0,
                path: source.to_path_buf(),
            },
            action,
            destination: destination.map(Path::to_path_buf),
        }
    }

    struct CountingConfirm(AtomicUsize, bool);

    impl Confirm for CountingConfirm {
        fn confirm(&self, _action: Action, _count: usize) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            self.1
        }
    }

    #[test]
    fn test_declined_move_runs_nothing() {
        let dir = tempdir().unwrap();
        let gate = SafetyGate::with_prefixes(vec![]);
        let plans = vec![plan(
            Action::Move,
            &dir.path().join("a.txt"),
            Some(&dir.path().join("out/a.txt")),
        )];

        assert!(matches!(
            gate.check(plans, &FixedAnswer(false)),
            GateDecision::Declined
        ));
    }

    #[test]
    fn test_copy_needs_no_confirmation() {
        let dir = tempdir().unwrap();
        let gate = SafetyGate::with_prefixes(vec![]);
        let confirm = CountingConfirm(AtomicUsize::new(0), false);
        let plans = vec![plan(
            Action::Copy,
            &dir.path().join("a.txt"),
            Some(&dir.path().join("out/a.txt")),
        )];

        match gate.check(plans, &confirm) {
            GateDecision::Cleared { runnable, rejected } => {
                assert_eq!(runnable.len(), 1);
                assert!(rejected.is_empty());
            }
            GateDecision::Declined => panic!("copy must not be declined"),
        }
        assert_eq!(confirm.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_confirmation_asked_once_per_batch() {
        let dir = tempdir().unwrap();
        let gate = SafetyGate::with_prefixes(vec![]);
        let confirm = CountingConfirm(AtomicUsize::new(0), true);
        let plans = (0..5)
            .map(|i| plan(Action::Delete, &dir.path().join(format!("{}.txt", i)), None))
            .collect();

        assert!(matches!(
            gate.check(plans, &confirm),
            GateDecision::Cleared { .. }
        ));
        assert_eq!(confirm.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_protected_source_rejected_even_when_confirmed() {
        let dir = tempdir().unwrap();
        let protected = dir.path().join("system");
        let gate = SafetyGate::with_prefixes(vec![protected.clone()]);

        let plans = vec![
            plan(Action::Delete, &protected.join("kernel.bin"), None),
            plan(Action::Delete, &dir.path().join("user/notes.txt"), None),
        ];

        match gate.check(plans, &FixedAnswer(true)) {
            GateDecision::Cleared { runnable, rejected } => {
                assert_eq!(runnable.len(), 1);
                assert_eq!(rejected.len(), 1);
                assert_eq!(
                    rejected[0].outcome,
                    Outcome::failed(PROTECTED_LOCATION)
                );
            }
            GateDecision::Declined => panic!("confirmed batch was declined"),
        }
    }

    #[test]
    fn test_copy_checks_destination_only() {
        let dir = tempdir().unwrap();
        let protected = dir.path().join("system");
        let gate = SafetyGate::with_prefixes(vec![protected.clone()]);

        let plans = vec![
            // reading from a protected folder is fine
            plan(
                Action::Copy,
                &protected.join("a.dll"),
                Some(&dir.path().join("out/a.dll")),
            ),
            // writing into one is not
            plan(
                Action::Copy,
                &dir.path().join("b.dll"),
                Some(&protected.join("b.dll")),
            ),
        ];

        match gate.check(plans, &FixedAnswer(true)) {
            GateDecision::Cleared { runnable, rejected } => {
                assert_eq!(runnable.len(), 1);
                assert_eq!(runnable[0].source.path, protected.join("a.dll"));
                assert_eq!(rejected.len(), 1);
            }
            GateDecision::Declined => panic!("copy was declined"),
        }
    }

    #[test]
    fn test_default_system_locations() {
        let gate = SafetyGate::new(&[]);
        #[cfg(not(windows))]
        assert!(gate.is_protected(Path::new("/etc/passwd")));
        #[cfg(windows)]
        assert!(gate.is_protected(Path::new(r"C:\Windows\System32\drivers\etc\hosts")));

        let dir = tempdir().unwrap();
        assert!(!gate.is_protected(&dir.path().join("file.txt")));
    }

    #[test]
    fn test_empty_plan_list_is_cleared_without_asking() {
        let gate = SafetyGate::with_prefixes(vec![]);
        let confirm = CountingConfirm(AtomicUsize::new(0), false);
        assert!(matches!(
            gate.check(Vec::new(), &confirm),
            GateDecision::Cleared { .. }
        ));
        assert_eq!(confirm.0.load(Ordering::SeqCst), 0);
    }
}
