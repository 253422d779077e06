use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use once_cell::sync::OnceCell;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace, warn};

use crate::errors::{BatchError, BatchResult};

/// An already-built file-name index answering one name pattern at a time.
///
/// Implementations must be callable from several worker threads at once.
pub trait SearchProvider: Send + Sync {
    /// Returns the absolute paths of every indexed file matching `pattern`
    fn search(&self, pattern: &str) -> BatchResult<Vec<PathBuf>>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

const ES_EXECUTABLE: &str = "es";

/// Where the client would live inside `dir`, with the platform's executable suffix
fn es_candidate(dir: &Path) -> PathBuf {
    dir.join(format!("{}{}", ES_EXECUTABLE, env::consts::EXE_SUFFIX))
}

/// Queries the Everything index through its command-line client
#[derive(Debug, Clone)]
pub struct EsProvider {
    executable: PathBuf,
}

impl EsProvider {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Uses `es_path` when given, otherwise looks for the client in the usual places
    pub fn from_config(es_path: Option<&Path>) -> BatchResult<Self> {
        match es_path {
            Some(path) => Ok(Self::new(path)),
            None => Self::locate().map(Self::new).ok_or_else(|| {
                BatchError::provider(format!(
                    "could not find {}; install the Everything command-line interface or pass --es-path",
                    ES_EXECUTABLE
                ))
            }),
        }
    }

    /// Looks for the client on `PATH`, in the Everything install folders and in the
    /// current directory, in that order
    pub fn locate() -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();

        for var in ["ProgramFiles", "ProgramFiles(x86)"] {
            if let Some(dir) = env::var_os(var) {
                candidates.push(PathBuf::from(dir).join("Everything"));
            }
        }
        if let Ok(cwd) = env::current_dir() {
            candidates.push(cwd);
        }

        candidates
            .into_iter()
            .map(|dir| es_candidate(&dir))
            .find(|path| path.is_file())
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Asks the client for the Everything version, which also proves the index service is up
    pub fn version(&self) -> BatchResult<String> {
        let output = Command::new(&self.executable)
            .arg("-get-everything-version")
            .output()
            .map_err(|e| {
                BatchError::provider(format!(
                    "failed to run {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(BatchError::provider(format!(
                "Everything is not reachable ({})",
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl SearchProvider for EsProvider {
    fn search(&self, pattern: &str) -> BatchResult<Vec<PathBuf>> {
        trace!("es -full-path-and-name {}", pattern);
        let output = Command::new(&self.executable)
            .arg("-full-path-and-name")
            .arg(pattern)
            .output()
            .map_err(|e| {
                BatchError::provider(format!(
                    "failed to run {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BatchError::provider(format!(
                "{} exited with {}: {}",
                ES_EXECUTABLE,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_path_lines(&String::from_utf8_lossy(&output.stdout)))
    }

    fn name(&self) -> &str {
        "everything"
    }
}

/// One path per line, surrounding whitespace trimmed, blank lines dropped
pub(crate) fn parse_path_lines(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Answers name queries by walking a set of roots once and matching file names.
///
/// Bare names match case-insensitively anywhere in the file name, wildcard names
/// (`*`, `?`, `[..]`) are matched as globs against the whole file name, and names that
/// contain a path separator are matched against the full path.
#[derive(Debug)]
pub struct WalkProvider {
    roots: Vec<PathBuf>,
    listing: OnceCell<Vec<PathBuf>>,
}

impl WalkProvider {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            listing: OnceCell::new(),
        }
    }

    fn listing(&self) -> BatchResult<&[PathBuf]> {
        self.listing
            .get_or_try_init(|| {
                let mut files = Vec::new();
                for root in &self.roots {
                    if !root.is_dir() {
                        return Err(BatchError::provider(format!(
                            "search root not found: {}",
                            root.display()
                        )));
                    }
                    let root = root.canonicalize()?;
                    let walker = WalkBuilder::new(&root)
                        .hidden(false)
                        .ignore(false)
                        .git_ignore(false)
                        .git_global(false)
                        .git_exclude(false)
                        .build();
                    for entry in walker {
                        match entry {
                            Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                                files.push(entry.into_path())
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Skipping unreadable entry: {}", e),
                        }
                    }
                }
                debug!("Walk provider indexed {} files", files.len());
                Ok(files)
            })
            .map(Vec::as_slice)
    }
}

enum NameMatcher {
    Glob(Pattern),
    Substring(String),
}

impl NameMatcher {
    fn new(pattern: &str) -> BatchResult<Self> {
        if pattern.contains(['*', '?', '[']) {
            Pattern::new(pattern)
                .map(NameMatcher::Glob)
                .map_err(|e| BatchError::provider(format!("bad wildcard '{}': {}", pattern, e)))
        } else {
            Ok(NameMatcher::Substring(pattern.to_lowercase()))
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            NameMatcher::Glob(glob) => glob.matches_with(
                candidate,
                MatchOptions {
                    case_sensitive: false,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
            NameMatcher::Substring(needle) => candidate.to_lowercase().contains(needle.as_str()),
        }
    }
}

impl SearchProvider for WalkProvider {
    fn search(&self, pattern: &str) -> BatchResult<Vec<PathBuf>> {
        let matcher = NameMatcher::new(pattern)?;
        let match_full_path = pattern.contains(['/', '\\']);

        Ok(self
            .listing()?
            .iter()
            .filter(|path| {
                if match_full_path {
                    matcher.matches(&path.to_string_lossy())
                } else {
                    path.file_name()
                        .is_some_and(|name| matcher.matches(&name.to_string_lossy()))
                }
            })
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "walk"
    }
}
