//! Configuration loading and management

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::broker::Action;
use crate::hotkey::Combination;
use crate::worker::{KeystrokeDelay, WorkerConfig};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "CLIPTYPE_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for runtime data
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Hotkey of each action; actions left out keep their default
    pub hotkeys: BTreeMap<Action, String>,

    /// Upper bound of the random pause before each keystroke
    pub max_keystroke_delay_ms: u64,

    /// Idle wait of the runtime loops when their queue is empty
    pub poll_interval_ms: u64,
}

/// Hotkey bound to `action` when the config file does not set one
pub fn default_hotkey(action: Action) -> &'static str {
    match action {
        Action::Write => "ctrl+alt+v",
        Action::Interrupt => "ctrl+alt+x",
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            hotkeys: Action::ALL
                .into_iter()
                .map(|action| (action, default_hotkey(action).to_string()))
                .collect(),
            max_keystroke_delay_ms: 200,
            poll_interval_ms: 50,
        }
    }
}

impl Config {
    /// Load configuration from environment, config file and defaults
    ///
    /// The file is `$CLIPTYPE_CONFIG`, or `config.json` in the data
    /// directory. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("neither HOME nor USERPROFILE is set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("cliptype");

        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("config.json"));

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.data_dir = data_dir;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse and validate JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("failed to parse config")?;
        config.hotkeys()?;
        Ok(config)
    }

    /// Parsed hotkey of every action
    pub fn hotkeys(&self) -> Result<BTreeMap<Action, Combination>> {
        Action::ALL
            .into_iter()
            .map(|action| -> Result<(Action, Combination)> {
                let hotkey = self
                    .hotkeys
                    .get(&action)
                    .map(String::as_str)
                    .unwrap_or_else(|| default_hotkey(action));
                let combination = hotkey
                    .parse()
                    .with_context(|| format!("invalid {} hotkey {:?}", action, hotkey))?;
                Ok((action, combination))
            })
            .collect()
    }

    /// Hotkey labels shown at startup
    pub fn labels(&self) -> Result<BTreeMap<Action, String>> {
        Ok(self
            .hotkeys()?
            .into_iter()
            .map(|(action, combination)| (action, combination.to_string()))
            .collect())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn keystroke_delay(&self) -> KeystrokeDelay {
        KeystrokeDelay::new(Duration::from_millis(self.max_keystroke_delay_ms))
    }

    /// Settings of the worker runtime
    pub fn worker(&self) -> Result<WorkerConfig> {
        Ok(WorkerConfig {
            hotkeys: self.hotkeys()?,
            delay: self.keystroke_delay(),
            poll_interval: self.poll_interval(),
        })
    }
}
