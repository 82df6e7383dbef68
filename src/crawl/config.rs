// src/crawl/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dedup::DedupConfig;

const ENV_PATH: &str = "CRAWLER_CONFIG_PATH";

/// Service-wide crawler configuration. Every field has a default so a
/// partial (or absent) config file is fine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Deadline applied to each adapter fetch call.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub dedup: DedupConfig,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            dedup: DedupConfig::default(),
        }
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<CrawlerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading crawler config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load configuration using env var + fallbacks:
/// 1) $CRAWLER_CONFIG_PATH
/// 2) config/crawler.toml
/// 3) config/crawler.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<CrawlerConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("CRAWLER_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/crawler.toml");
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from("config/crawler.json");
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(CrawlerConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<CrawlerConfig> {
    let try_toml = hint_ext == "toml" || s.contains("fetch_timeout_secs") || s.contains("[dedup]");
    if try_toml {
        if let Ok(v) = toml::from_str(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = toml::from_str(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported crawler config format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let cfg = parse_config(
            r#"
fetch_timeout_secs = 10

[dedup]
dedup_hours_back = 24
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.fetch_timeout_secs, 10);
        assert_eq!(cfg.dedup.dedup_hours_back, 24);
        assert_eq!(cfg.dedup.title_similarity_threshold, 0.85);
        assert!(cfg.dedup.fuzzy_dedup_enabled);
    }

    #[test]
    fn json_format_works_too() {
        let cfg = parse_config(r#"{"dedup": {"cross_source_dedup": false}}"#, "json").unwrap();
        assert!(!cfg.dedup.cross_source_dedup);
        assert_eq!(cfg.fetch_timeout_secs, 30);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD in a temp dir so a real config/ in the repo does not
        // interfere.
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_PATH);

        // No files in the temp CWD → built-in defaults.
        let cfg = load_config_default().unwrap();
        assert_eq!(cfg.fetch_timeout_secs, 30);

        // Env var takes precedence.
        let p_json = tmp.path().join("crawler.json");
        fs::write(&p_json, r#"{"fetch_timeout_secs": 5}"#).unwrap();
        env::set_var(ENV_PATH, p_json.display().to_string());
        let cfg = load_config_default().unwrap();
        assert_eq!(cfg.fetch_timeout_secs, 5);
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
