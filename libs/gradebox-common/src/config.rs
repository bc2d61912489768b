// Language table: the immutable language -> sandbox/command lookup
// Built once at startup and passed explicitly into the pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_WORK_DIR: &str = "/app/";
pub const DEFAULT_TEST_FLAG: &str = "test";
pub const FALLBACK_FILE_NAME: &str = "solution.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read language config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse language config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no languages configured")]
    Empty,

    #[error("language '{0}' is configured more than once")]
    Duplicate(String),

    #[error("language '{0}' has an empty run command")]
    EmptyCommand(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    #[serde(default)]
    pub file_name: Option<String>,
    pub run_command: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    /// Sandbox override; defaults to `{name}-app`
    #[serde(default)]
    pub sandbox: Option<String>,
    #[serde(default = "default_test_flag")]
    pub test_flag: String,
}

fn default_work_dir() -> String {
    DEFAULT_WORK_DIR.to_string()
}

fn default_test_flag() -> String {
    DEFAULT_TEST_FLAG.to_string()
}

impl LanguageConfig {
    pub fn new(name: &str, file_name: &str, run_command: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            run_command: run_command.to_string(),
            work_dir: default_work_dir(),
            sandbox: None,
            test_flag: default_test_flag(),
        }
    }

    /// Name of the long-lived sandbox serving this language
    pub fn sandbox_name(&self) -> String {
        self.sandbox
            .clone()
            .unwrap_or_else(|| format!("{}-app", self.name))
    }

    pub fn file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(FALLBACK_FILE_NAME)
    }

    /// Shell command for one run, with the test flag appended in test mode
    pub fn command(&self, test_mode: bool) -> String {
        if test_mode {
            format!("{} {}", self.run_command, self.test_flag)
        } else {
            self.run_command.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct LanguagesFile {
    languages: Vec<LanguageConfig>,
}

/// Supported languages, keyed by name
#[derive(Debug, Clone)]
pub struct LanguageTable {
    languages: BTreeMap<String, LanguageConfig>,
}

impl LanguageTable {
    /// Python and Go, served from `/app/` in `{name}-app` sandboxes
    pub fn builtin() -> Self {
        let languages = [
            LanguageConfig::new("python", "solution.py", "python3 /app/solution.py"),
            LanguageConfig::new("go", "solution.go", "go run /app/solution.go"),
        ];
        Self {
            languages: languages
                .into_iter()
                .map(|lang| (lang.name.clone(), lang))
                .collect(),
        }
    }

    pub fn from_configs(configs: Vec<LanguageConfig>) -> Result<Self, ConfigError> {
        if configs.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut languages = BTreeMap::new();
        for lang in configs {
            if lang.run_command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand(lang.name));
            }
            if languages.contains_key(&lang.name) {
                return Err(ConfigError::Duplicate(lang.name));
            }
            languages.insert(lang.name.clone(), lang);
        }

        Ok(Self { languages })
    }

    /// Load from a `languages.json` file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: LanguagesFile = serde_json::from_str(&content)?;
        Self::from_configs(file.languages)
    }

    /// Load from `path` when given, otherwise use the built-in table
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn get(&self, language: &str) -> Option<&LanguageConfig> {
        self.languages.get(language)
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.languages.contains_key(language)
    }

    pub fn names(&self) -> Vec<String> {
        self.languages.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageConfig> {
        self.languages.values()
    }
}
