use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::job::ErrorStrategy;

const PROJECT_FILE: &str = ".recordflowrc";

/// Executor settings read from `.recordflowrc` / `config.ini`
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFile {
    pub threads: Option<usize>,
    pub on_error: Option<ErrorStrategy>,
    pub read_timeout: Option<Duration>,
}

impl ConfigFile {
    /// Find project-level .recordflowrc by walking up directory tree
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;
        loop {
            let config_path = current.join(PROJECT_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// Get list of user config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("recordflow").join("config.ini"));
            }
            if let Ok(userprofile) = env::var("USERPROFILE") {
                paths.push(PathBuf::from(userprofile).join(PROJECT_FILE));
            }
        } else {
            // $XDG_CONFIG_HOME/recordflow/config.ini, then ~/.recordflowrc
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });
            paths.push(xdg_config.join("recordflow").join("config.ini"));

            if let Ok(home) = env::var("HOME") {
                paths.push(PathBuf::from(home).join(PROJECT_FILE));
            }
        }

        paths
    }

    /// Load configuration with proper precedence: project > user > defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::get_user_config_paths().into_iter().find(|p| p.exists()) {
            config = Self::merge_configs(config, Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = Self::merge_configs(config, Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    /// Load configuration with optional custom config file path
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse_ini_content(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn parse_ini_content(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].trim().to_string();
                continue;
            }

            let Some(eq_pos) = line.find('=') else {
                return Err(anyhow!("line {}: expected 'key = value'", idx + 1));
            };
            let key = line[..eq_pos].trim();
            let value = line[eq_pos + 1..].trim();

            // Only [executor] is understood; other sections are ignored
            if current_section != "executor" {
                continue;
            }
            match key {
                "threads" => {
                    let threads: usize = value
                        .parse()
                        .with_context(|| format!("line {}: invalid threads '{}'", idx + 1, value))?;
                    config.threads = Some(threads);
                }
                "on_error" => {
                    let strategy = ErrorStrategy::from_str(value, true)
                        .map_err(|e| anyhow!("line {}: invalid on_error '{}': {}", idx + 1, value, e))?;
                    config.on_error = Some(strategy);
                }
                "read_timeout" => {
                    let timeout = humantime::parse_duration(value).with_context(|| {
                        format!("line {}: invalid read_timeout '{}'", idx + 1, value)
                    })?;
                    config.read_timeout = Some(timeout);
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Merge two configuration objects, with the second taking precedence
    fn merge_configs(base: Self, overlay: Self) -> Self {
        Self {
            threads: overlay.threads.or(base.threads),
            on_error: overlay.on_error.or(base.on_error),
            read_timeout: overlay.read_timeout.or(base.read_timeout),
        }
    }

    /// Show configuration information with precedence details
    pub fn show_config() {
        println!("Configuration precedence: CLI > project .recordflowrc > user config > defaults\n");

        let project_config_path = Self::find_project_config();
        let user_config_paths = Self::get_user_config_paths();
        let user_config_path = user_config_paths.iter().find(|p| p.exists());

        match Self::load() {
            Ok(merged) => {
                let mut loaded_from = Vec::new();
                if let Some(project_path) = &project_config_path {
                    loaded_from.push(format!("Project: {}", project_path.display()));
                }
                if let Some(user_path) = user_config_path {
                    loaded_from.push(format!("User: {}", user_path.display()));
                }

                if loaded_from.is_empty() {
                    println!("No configuration files found. Using defaults.");
                } else {
                    println!("Configuration loaded from:");
                    for source in loaded_from {
                        println!("  {}", source);
                    }
                }

                println!("\nActive [executor] settings:");
                if let Some(threads) = merged.threads {
                    println!("  threads = {}", threads);
                }
                if let Some(strategy) = merged.on_error {
                    println!("  on_error = {:?}", strategy);
                }
                if let Some(timeout) = merged.read_timeout {
                    println!("  read_timeout = {}", humantime::format_duration(timeout));
                }
            }
            Err(e) => {
                eprintln!("Error loading configuration: {:#}", e);
            }
        }

        println!("\nConfiguration search locations (in precedence order):");
        match &project_config_path {
            Some(project_path) => println!("  1. Project: {} (found)", project_path.display()),
            None => println!("  1. Project: .recordflowrc (searched up directory tree, not found)"),
        }
        for (i, path) in user_config_paths.iter().enumerate() {
            let status = if path.exists() { "(found)" } else { "(not found)" };
            println!("  {}. User: {} {}", i + 2, path.display(), status);
        }

        if project_config_path.is_none() && user_config_path.is_none() {
            println!("\nExample configuration file (.recordflowrc):");
            println!();
            println!("[executor]");
            println!("threads = 4");
            println!("on_error = skip");
            println!("read_timeout = 30s");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# tuned for the laptop").unwrap();
        writeln!(file, "[executor]").unwrap();
        writeln!(file, "threads = 3").unwrap();
        writeln!(file, "on_error = abort").unwrap();
        writeln!(file, "read_timeout = 1m 30s").unwrap();
        writeln!(file, "unknown = ignored").unwrap();
        writeln!(file, "[other]").unwrap();
        writeln!(file, "threads = 99").unwrap();
        file.flush().unwrap();

        let config = ConfigFile::load_from_path(file.path()).unwrap();
        assert_eq!(config.threads, Some(3));
        assert_eq!(config.on_error, Some(ErrorStrategy::Abort));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = ConfigFile::parse_ini_content("[executor]\nthreads = many\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        assert!(ConfigFile::parse_ini_content("[executor]\non_error = retry\n").is_err());
        assert!(ConfigFile::parse_ini_content("[executor]\nread_timeout = soon\n").is_err());
        assert!(ConfigFile::parse_ini_content("[executor]\njust a line\n").is_err());
    }

    #[test]
    fn test_merge_overlay_wins() {
        let user = ConfigFile {
            threads: Some(8),
            on_error: Some(ErrorStrategy::Skip),
            read_timeout: None,
        };
        let project = ConfigFile {
            threads: Some(2),
            on_error: None,
            read_timeout: Some(Duration::from_secs(5)),
        };
        let merged = ConfigFile::merge_configs(user, project);
        assert_eq!(merged.threads, Some(2));
        assert_eq!(merged.on_error, Some(ErrorStrategy::Skip));
        assert_eq!(merged.read_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_missing_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ini");
        assert!(ConfigFile::load_with_custom_path(Some(&missing)).is_err());
    }
}
