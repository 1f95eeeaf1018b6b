// SPDX-License-Identifier: MPL-2.0

//! Host configuration for the otousan wallpaper daemon.
//!
//! Only the surroundings of the wallpaper are configurable: where the assets
//! live, how the ringer mode is discovered, playback volume and the layer
//! namespace. The interaction itself (tolerances, frame cadence, clip set)
//! is fixed.

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const APP_ID: &str = "otousan";
pub const CONFIG_FILE: &str = "config.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no user configuration directory")]
    NoConfigDir,
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize config")]
    Serialize(#[from] ron::Error),
}

/// Where the ringer mode is read from before a tap may start speech.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RingerSource {
    /// Ask feedbackd for its current profile over the session bus.
    #[default]
    Feedbackd,
    /// Always behave as if the ringer is in normal mode.
    Normal,
    /// Always behave as if the device is silenced.
    Silent,
}

impl fmt::Display for RingerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RingerSource::Feedbackd => "feedbackd",
            RingerSource::Normal => "normal",
            RingerSource::Silent => "silent",
        })
    }
}

impl FromStr for RingerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "feedbackd" => Ok(RingerSource::Feedbackd),
            "normal" => Ok(RingerSource::Normal),
            "silent" => Ok(RingerSource::Silent),
            other => Err(format!(
                "unknown ringer source `{other}` (expected feedbackd, normal or silent)"
            )),
        }
    }
}

#[must_use]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Setters)]
#[serde(default)]
#[setters(prefix = "with_")]
pub struct Config {
    /// Directory holding the frame images and the voice clips.
    #[setters(into)]
    pub assets: PathBuf,
    pub ringer: RingerSource,
    /// Playback volume, clamped to `0.0..=1.0` when applied.
    pub volume: f32,
    /// Namespace requested for the background layer surface.
    #[setters(into)]
    pub namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_ID),
            ringer: RingerSource::default(),
            volume: 1.0,
            namespace: APP_ID.to_owned(),
        }
    }
}

impl Config {
    /// Location of the user's config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_ID).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads the user's config file, or the defaults if there is none.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        let config = Self::from_ron(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;

        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
    }

    /// Writes to the user's config file and returns its path.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_ron()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_owned(),
                source,
            })?;
        }

        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_owned(),
            source,
        })
    }

    /// Volume as applied to playback.
    #[must_use]
    pub fn clamped_volume(&self) -> f32 {
        if self.volume.is_nan() {
            return 1.0;
        }
        self.volume.clamp(0.0, 1.0)
    }
}
