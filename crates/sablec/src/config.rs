//! Configuration file parsing for sable.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file names to search for
const CONFIG_NAMES: &[&str] = &["sable.toml", ".sablerc.toml"];

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Executable metadata
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Optimization settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

/// Executable metadata written into every NEF file.
#[derive(Debug, Deserialize)]
pub struct CompilerConfig {
    /// Compiler identifier
    #[serde(default = "default_compiler_id")]
    pub id: String,

    /// Source URL
    #[serde(default)]
    pub source: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            id: default_compiler_id(),
            source: String::new(),
        }
    }
}

/// Optimizer configuration.
#[derive(Debug, Deserialize)]
pub struct OptimizerConfig {
    /// Run dead code elimination during `build`
    #[serde(default = "default_true")]
    pub dead_code: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { dead_code: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_compiler_id() -> String {
    format!("sablec {}", env!("CARGO_PKG_VERSION"))
}

/// Load configuration from a file or search for default config files.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::current_dir()
            .ok()
            .and_then(|cwd| find_config_file(&cwd)),
    };

    match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!("Loaded config from {}", path.display());
            Ok(config)
        }
        Some(path) => anyhow::bail!("Config file {} does not exist", path.display()),
        None => Ok(Config::default()),
    }
}

/// Search for a configuration file in `start` and its parent directories.
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.compiler.id.starts_with("sablec "));
        assert!(config.compiler.source.is_empty());
        assert!(config.optimizer.dead_code);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[compiler]
id = "custom 1.0"
source = "https://example.invalid/token"

[optimizer]
dead_code = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.compiler.id, "custom 1.0");
        assert_eq!(config.compiler.source, "https://example.invalid/token");
        assert!(!config.optimizer.dead_code);
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str("[compiler]\nsource = \"x\"\n").unwrap();
        assert!(config.compiler.id.starts_with("sablec "));
        assert!(config.optimizer.dead_code);
    }

    #[test]
    fn test_find_in_ancestors() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join(".sablerc.toml"), "[optimizer]\ndead_code = false\n")
            .unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, root.path().join(".sablerc.toml"));
        let config = load_config(Some(&found)).unwrap();
        assert!(!config.optimizer.dead_code);
    }

    #[test]
    fn test_explicit_missing_file() {
        let root = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&root.path().join("nope.toml"))).is_err());
    }
}
