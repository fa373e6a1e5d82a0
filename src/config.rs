//! Application configuration: environment first, command line on top.

use std::env;
use std::path::PathBuf;

use feature_detectors::ClassifierConfig;
use journey_engine::RunnerConfig;
use navigator::{NavTimeouts, Pacing};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("max sessions must be at least 1")]
    ZeroSessions,
}

/// Resolved settings for one CLI invocation.
#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub max_sessions: usize,
    pub default_country: String,
    pub pacing: Pacing,
    pub artifacts_dir: PathBuf,
    pub headless: bool,
    /// `None` leaves the classifier fallback disabled.
    #[serde(skip)]
    pub classifier: Option<ClassifierConfig>,
}

impl AppConfig {
    /// Resolve from the process environment. CLI flags are layered on
    /// afterwards through the `with_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_sessions = match env::var("FUNNELPROBE_MAX_SESSIONS") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| ConfigError::Invalid {
                name: "FUNNELPROBE_MAX_SESSIONS",
                value: raw.clone(),
            })?,
            Err(_) => 3,
        };
        if max_sessions == 0 {
            return Err(ConfigError::ZeroSessions);
        }

        let pacing = match env::var("FUNNELPROBE_PACING") {
            Ok(raw) => parse_pacing(&raw).ok_or(ConfigError::Invalid {
                name: "FUNNELPROBE_PACING",
                value: raw,
            })?,
            Err(_) => Pacing::Normal,
        };

        Ok(Self {
            max_sessions,
            default_country: env::var("FUNNELPROBE_COUNTRY").unwrap_or_else(|_| "US".to_string()),
            pacing,
            artifacts_dir: env::var("FUNNELPROBE_ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./funnelprobe-artifacts")),
            headless: true,
            classifier: ClassifierConfig::from_env(),
        })
    }

    pub fn with_max_sessions(mut self, max: Option<usize>) -> Result<Self, ConfigError> {
        if let Some(max) = max {
            if max == 0 {
                return Err(ConfigError::ZeroSessions);
            }
            self.max_sessions = max;
        }
        Ok(self)
    }

    pub fn with_country(mut self, country: Option<String>) -> Self {
        if let Some(country) = country {
            self.default_country = country.to_ascii_uppercase();
        }
        self
    }

    pub fn with_artifacts_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.artifacts_dir = dir;
        }
        self
    }

    pub fn with_headful(mut self, headful: bool) -> Self {
        if headful {
            self.headless = false;
        }
        self
    }

    pub fn with_pacing(mut self, pacing: Option<Pacing>) -> Self {
        if let Some(pacing) = pacing {
            self.pacing = pacing;
        }
        self
    }

    /// Runner tunables derived from the resolved settings.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_sessions: self.max_sessions,
            pacing: self.pacing,
            nav: NavTimeouts::default(),
            default_country: self.default_country.clone(),
            ..RunnerConfig::default()
        }
    }
}

pub fn parse_pacing(raw: &str) -> Option<Pacing> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "fast" => Some(Pacing::Fast),
        "normal" => Some(Pacing::Normal),
        "careful" => Some(Pacing::Careful),
        _ => None,
    }
}
