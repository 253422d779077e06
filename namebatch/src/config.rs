use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{BatchError, BatchResult};

/// Bulk action applied to every match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Search only, list what was found
    #[default]
    None,
    Copy,
    Move,
    Delete,
}

impl Action {
    /// Move and Delete change or remove the source file
    pub fn is_destructive(self) -> bool {
        matches!(self, Action::Move | Action::Delete)
    }

    pub fn needs_destination(self) -> bool {
        matches!(self, Action::Copy | Action::Move)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::None => "none",
            Action::Copy => "copy",
            Action::Move => "move",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Which search provider answers name queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The Everything command-line client (`es`)
    #[default]
    Everything,
    /// Walk `search_roots` and match file names directly
    Walk,
}

/// Configuration for a batch run.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.namebatch.yaml` in the current directory
/// 3. Global `$HOME/.config/namebatch/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Leave names as typed (true) or append default_extension to bare names (false)
/// match_extension: false
/// default_extension: ".pdf"
///
/// # Replicate source folders under the destination
/// preserve_structure: true
///
/// # Remembered output folder; --copy-to / --move-to replace it
/// destination_root: "D:/collected"
///
/// # Only keep matches whose full path matches this regex
/// regex_pattern: "\\\\Projects\\\\"
///
/// # Write a timestamped run log here
/// log_path: "logs"
///
/// # Extra locations that must never be moved or deleted
/// protected_paths:
///   - "D:/Archive"
///
/// provider: everything
/// thread_count: 4
/// log_level: "info"
/// ```
///
/// Command-line arguments take precedence over config file values, see `merge_with_cli`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// When false, names without an extension get `default_extension` appended
    #[serde(default = "default_true")]
    pub match_extension: bool,

    /// Extension appended to bare names when `match_extension` is false
    #[serde(default)]
    pub default_extension: String,

    /// Replicate each match's folder chain under the destination root
    #[serde(default = "default_true")]
    pub preserve_structure: bool,

    /// Set from the command line only; files never choose what happens to matches
    #[serde(skip)]
    pub action: Action,

    /// Output root for copy and move
    #[serde(default)]
    pub destination_root: Option<PathBuf>,

    /// Secondary filter over full match paths
    #[serde(default)]
    pub regex_pattern: Option<String>,

    /// Directory receiving the run log; no log is written when unset
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Protected prefixes in addition to the built-in system locations
    #[serde(default)]
    pub protected_paths: Vec<PathBuf>,

    #[serde(default)]
    pub provider: ProviderKind,

    /// Explicit path to the `es` executable
    #[serde(default)]
    pub es_path: Option<PathBuf>,

    /// Roots walked by the walk provider
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,

    /// Number of worker threads for searching and file operations
    /// Defaults to number of CPU cores if not specified
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            match_extension: true,
            default_extension: String::new(),
            preserve_structure: true,
            action: Action::None,
            destination_root: None,
            regex_pattern: None,
            log_path: None,
            protected_paths: Vec::new(),
            provider: ProviderKind::Everything,
            es_path: None,
            search_roots: Vec::new(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
        }
    }
}

/// The per-user configuration file, `<config dir>/namebatch/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("namebatch").join("config.yaml"))
}

impl BatchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from a specific file on top of the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            default_config_path(),
            Some(PathBuf::from(".namebatch.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() || Some(path.as_path()) == config_path {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Writes the configuration as YAML so the next run starts from it
    pub fn save_to(&self, path: &Path) -> BatchResult<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| BatchError::config_error(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Merges CLI arguments with configuration file values.
    ///
    /// Flags only override when they differ from their defaults, so an unset flag
    /// never clobbers a value that came from a file.
    pub fn merge_with_cli(mut self, cli: BatchConfig) -> Self {
        if !cli.match_extension {
            self.match_extension = false;
        }
        if !cli.default_extension.is_empty() {
            self.default_extension = cli.default_extension;
        }
        if !cli.preserve_structure {
            self.preserve_structure = false;
        }
        if cli.action != Action::None {
            self.action = cli.action;
        }
        if cli.destination_root.is_some() {
            self.destination_root = cli.destination_root;
        }
        if cli.regex_pattern.is_some() {
            self.regex_pattern = cli.regex_pattern;
        }
        if cli.log_path.is_some() {
            self.log_path = cli.log_path;
        }
        self.protected_paths.extend(cli.protected_paths);
        if cli.provider != ProviderKind::default() {
            self.provider = cli.provider;
        }
        if cli.es_path.is_some() {
            self.es_path = cli.es_path;
        }
        if !cli.search_roots.is_empty() {
            self.search_roots = cli.search_roots;
        }
        if cli.thread_count != default_thread_count() {
            self.thread_count = cli.thread_count;
        }
        if cli.log_level != default_log_level() {
            self.log_level = cli.log_level;
        }
        self
    }

    /// Checks that the selected action can actually run
    pub fn validate(&self) -> BatchResult<()> {
        if self.action.needs_destination() && self.destination_root.is_none() {
            return Err(BatchError::config_error(format!(
                "{} requires a destination root",
                self.action
            )));
        }
        if self.provider == ProviderKind::Walk && self.search_roots.is_empty() {
            return Err(BatchError::config_error(
                "the walk provider needs at least one search root",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            match_extension: false
            default_extension: ".pdf"
            preserve_structure: false
            destination_root: "out"
            regex_pattern: "Projects"
            log_path: "logs"
            protected_paths: ["/srv/keep"]
            provider: walk
            search_roots: ["/data"]
            thread_count: 4
            log_level: "debug"
        "#;

        let mut file = fs::File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = BatchConfig::load_from(Some(&config_path)).unwrap();
        assert!(!config.match_extension);
        assert_eq!(config.default_extension, ".pdf");
        assert!(!config.preserve_structure);
        assert_eq!(config.action, Action::None);
        assert_eq!(config.destination_root, Some(PathBuf::from("out")));
        assert_eq!(config.regex_pattern.as_deref(), Some("Projects"));
        assert_eq!(config.log_path, Some(PathBuf::from("logs")));
        assert_eq!(config.protected_paths, vec![PathBuf::from("/srv/keep")]);
        assert_eq!(config.provider, ProviderKind::Walk);
        assert_eq!(config.search_roots, vec![PathBuf::from("/data")]);
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "log_path: \"logs\"\n").unwrap();

        let config = BatchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.action, Action::None);
        assert!(config.match_extension);
        assert!(config.default_extension.is_empty());
        assert!(config.preserve_structure);
        assert_eq!(config.destination_root, None);
        assert_eq!(config.provider, ProviderKind::Everything);
        assert_eq!(
            config.thread_count,
            NonZeroUsize::new(num_cpus::get()).unwrap()
        );
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "preserve_structure: \"sometimes\"\nthread_count: \"many\"\n",
        )
        .unwrap();

        let result = BatchConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_file_cannot_select_action() {
        let dir = tempdir().unwrap();
        for action in ["move", "delete", "copy"] {
            let config_path = dir.path().join(format!("{}.yaml", action));
            fs::write(
                &config_path,
                format!("action: {}\ndestination_root: \"out\"\n", action),
            )
            .unwrap();

            let config = BatchConfig::load_from(Some(&config_path)).unwrap();
            assert_eq!(config.action, Action::None, "{} leaked from file", action);
            assert_eq!(config.destination_root, Some(PathBuf::from("out")));

            let cli = BatchConfig::default();
            assert_eq!(config.merge_with_cli(cli).action, Action::None);
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = BatchConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.yaml");

        let config = BatchConfig {
            action: Action::Move,
            destination_root: Some(PathBuf::from("moved")),
            regex_pattern: Some(r"\.bak$".to_string()),
            ..BatchConfig::default()
        };
        config.save_to(&config_path).unwrap();

        assert!(!fs::read_to_string(&config_path).unwrap().contains("action"));

        let reloaded = BatchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(reloaded.action, Action::None);
        assert_eq!(reloaded.destination_root, Some(PathBuf::from("moved")));
        assert_eq!(reloaded.regex_pattern.as_deref(), Some(r"\.bak$"));
    }

    #[test]
    fn test_merge_with_cli() {
        let from_file = BatchConfig {
            default_extension: ".png".to_string(),
            action: Action::Copy,
            destination_root: Some(PathBuf::from("file-dest")),
            regex_pattern: Some("keep".to_string()),
            protected_paths: vec![PathBuf::from("/srv")],
            log_level: "info".to_string(),
            ..BatchConfig::default()
        };

        let cli = BatchConfig {
            preserve_structure: false,
            destination_root: Some(PathBuf::from("cli-dest")),
            protected_paths: vec![PathBuf::from("/opt")],
            thread_count: NonZeroUsize::new(2).unwrap(),
            ..BatchConfig::default()
        };

        let merged = from_file.merge_with_cli(cli);
        assert_eq!(merged.default_extension, ".png"); // File value
        assert_eq!(merged.action, Action::Copy); // CLI None keeps the base value
        assert!(!merged.preserve_structure); // CLI value
        assert_eq!(merged.destination_root, Some(PathBuf::from("cli-dest")));
        assert_eq!(merged.regex_pattern.as_deref(), Some("keep"));
        assert_eq!(
            merged.protected_paths,
            vec![PathBuf::from("/srv"), PathBuf::from("/opt")]
        );
        assert_eq!(merged.thread_count, NonZeroUsize::new(2).unwrap());
        assert_eq!(merged.log_level, "info"); // CLI left at default
    }

    #[test]
    fn test_validate() {
        let config = BatchConfig {
            action: Action::Copy,
            ..BatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(BatchError::ConfigError(_))));

        let config = BatchConfig {
            action: Action::Delete,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_ok());

        let config = BatchConfig {
            provider: ProviderKind::Walk,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
