//! Optional on-disk interpreter configuration — ambient, non-core knobs
//! only. Never consulted for story-dependent decisions.
//!
//! Follows the repo's existing `toml`-based game-config pattern, generalised
//! from a single runtime option to a small set of knobs: trace verbosity
//! and the default RNG mode.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl TraceLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            TraceLevel::Off => "off",
            TraceLevel::Error => "error",
            TraceLevel::Warn => "warn",
            TraceLevel::Info => "info",
            TraceLevel::Debug => "debug",
            TraceLevel::Trace => "trace",
        }
    }
}

impl Default for TraceLevel {
    fn default() -> Self {
        TraceLevel::Warn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "seed")]
pub enum RandomConfig {
    Uniform,
    Predictable(u64),
}

impl Default for RandomConfig {
    fn default() -> Self {
        RandomConfig::Uniform
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trace: TraceLevel,
    #[serde(default)]
    pub random: RandomConfig,
}

impl Config {
    /// Load `zmachine.toml` next to a story file, if present. A missing
    /// file is not an error — callers get [`Config::default`].
    pub fn load_near(story_path: &Path) -> Config {
        let config_path = story_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("zmachine.toml");
        match std::fs::read_to_string(&config_path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                log::warn!("ignoring malformed {}: {e}", config_path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    pub fn build_rand(&self) -> crate::zrand::ZRand {
        match self.random {
            RandomConfig::Uniform => crate::zrand::ZRand::new_uniform(),
            RandomConfig::Predictable(seed) => crate::zrand::ZRand::new_predictable(seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn default_config_is_uniform_and_warn() {
        let config = Config::default();
        assert_eq!(config.trace, TraceLevel::Warn);
        assert_eq!(config.random, RandomConfig::Uniform);
    }

    #[test]
    fn parses_predictable_rng_from_toml() {
        let text = "[random]\nmode = \"predictable\"\nseed = 42\n";
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.random, RandomConfig::Predictable(42));
    }

    #[test]
    fn missing_config_file_falls_back_to_default() {
        let config = Config::load_near(Path::new("/nonexistent/story.z3"));
        assert_eq!(config, Config::default());
    }
}
