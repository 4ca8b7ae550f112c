//! Service configuration, loaded from TOML with sensible defaults and
//! overridable from the CLI (SPEC_FULL.md §2, §6).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_root() -> PathBuf {
    PathBuf::from("/var/lib/carpetbag")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/carpetbag")
}

fn default_poll_interval_secs() -> u64 {
    3600
}

fn default_queue_name() -> String {
    "package_build_q".to_string()
}

fn default_stale_lock_secs() -> u64 {
    3600
}

fn default_boot_wait_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_name")]
    pub name: String,
    #[serde(default = "default_stale_lock_secs")]
    pub stale_lock_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            stale_lock_secs: default_stale_lock_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TablesConfig {
    pub pkgconfig_map: Option<PathBuf>,
    pub devel_package_map: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarpetbagConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_boot_wait_secs")]
    pub boot_wait_secs: u64,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub tables: TablesConfig,
}

impl Default for CarpetbagConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            log_dir: default_log_dir(),
            poll_interval_secs: default_poll_interval_secs(),
            boot_wait_secs: default_boot_wait_secs(),
            queue: QueueConfig::default(),
            tables: TablesConfig::default(),
        }
    }
}

impl CarpetbagConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default)]
            carpetbag: Option<InnerRoot>,
            #[serde(default)]
            queue: Option<QueueConfig>,
            #[serde(default)]
            tables: Option<TablesConfig>,
        }

        #[derive(Deserialize, Default)]
        struct InnerRoot {
            root: Option<PathBuf>,
            log_dir: Option<PathBuf>,
            poll_interval_secs: Option<u64>,
            boot_wait_secs: Option<u64>,
        }

        let w: Wrapper = toml::from_str(text).context("parsing config TOML")?;
        let mut cfg = CarpetbagConfig::default();
        if let Some(inner) = w.carpetbag {
            if let Some(v) = inner.root {
                cfg.root = v;
            }
            if let Some(v) = inner.log_dir {
                cfg.log_dir = v;
            }
            if let Some(v) = inner.poll_interval_secs {
                cfg.poll_interval_secs = v;
            }
            if let Some(v) = inner.boot_wait_secs {
                cfg.boot_wait_secs = v;
            }
        }
        if let Some(q) = w.queue {
            cfg.queue = q;
        }
        if let Some(t) = w.tables {
            cfg.tables = t;
        }
        Ok(cfg)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// Host directory holding `build.sh`/`wrapper.sh`, uploaded to every
    /// clone before the build exec (spec.md §4.5 step 3).
    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn queue_root(&self) -> PathBuf {
        self.root.join("dirq")
    }

    pub fn jobid_path(&self) -> PathBuf {
        self.root.join("jobid")
    }

    pub fn jobdb_path(&self) -> PathBuf {
        self.root.join("carpetbag.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_filesystem_layout() {
        let cfg = CarpetbagConfig::default();
        assert_eq!(cfg.root, PathBuf::from("/var/lib/carpetbag"));
        assert_eq!(cfg.uploads_dir(), PathBuf::from("/var/lib/carpetbag/uploads"));
        assert_eq!(cfg.scripts_dir(), PathBuf::from("/var/lib/carpetbag/scripts"));
        assert_eq!(cfg.queue_root(), PathBuf::from("/var/lib/carpetbag/dirq"));
        assert_eq!(cfg.poll_interval_secs, 3600);
    }

    #[test]
    fn parses_overrides_from_toml() {
        let toml = r#"
            [carpetbag]
            root = "/tmp/cb"
            poll_interval_secs = 60

            [queue]
            name = "test_q"
        "#;
        let cfg = CarpetbagConfig::parse(toml).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/tmp/cb"));
        assert_eq!(cfg.poll_interval_secs, 60);
        assert_eq!(cfg.queue.name, "test_q");
        // unspecified fields keep their defaults
        assert_eq!(cfg.queue.stale_lock_secs, 3600);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = CarpetbagConfig::parse("").unwrap();
        assert_eq!(cfg.root, default_root());
    }
}
