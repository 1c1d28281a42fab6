// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

pub const DEFAULT_VOLUME: f32 = 0.7;
pub const DEFAULT_FADE_IN_MS: u64 = 200;
pub const DEFAULT_FADE_OUT_MS: u64 = 150;

/// What happens when a binding is triggered while its previous playback is still active.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepeatBehavior {
    /// Stop the active playback and start nothing.
    StopOnRepeat,
    /// Stop the active playback and start it again from the beginning.
    #[default]
    RestartOnRepeat,
}

/// How long a clip plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DurationMode {
    /// Play once until the stream ends.
    PlayUntilEnd,
    /// Loop the stream and fade out once the duration has elapsed.
    FixedDuration(Duration),
}

/// Playback settings for a single clip.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ClipSettings {
    /// The audio file to play.
    file: PathBuf,
    /// Target volume, 0.0 to 1.0.
    #[serde(default = "default_volume")]
    volume: f32,
    #[serde(default = "default_fade_in_ms")]
    fade_in_ms: u64,
    #[serde(default = "default_fade_out_ms")]
    fade_out_ms: u64,
    /// Whether a newly triggered clip may cut this one off.
    #[serde(default = "default_true")]
    interruptible: bool,
    #[serde(default)]
    repeat: RepeatBehavior,
    /// A duration string such as "12s". Absent means play until the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

fn default_fade_in_ms() -> u64 {
    DEFAULT_FADE_IN_MS
}

fn default_fade_out_ms() -> u64 {
    DEFAULT_FADE_OUT_MS
}

fn default_true() -> bool {
    true
}

impl ClipSettings {
    /// Creates clip settings with default values for the given file.
    pub fn new(file: PathBuf) -> ClipSettings {
        ClipSettings {
            file,
            volume: DEFAULT_VOLUME,
            fade_in_ms: DEFAULT_FADE_IN_MS,
            fade_out_ms: DEFAULT_FADE_OUT_MS,
            interruptible: true,
            repeat: RepeatBehavior::default(),
            duration: None,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.fade_in_ms)
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    pub fn interruptible(&self) -> bool {
        self.interruptible
    }

    pub fn repeat(&self) -> RepeatBehavior {
        self.repeat
    }

    /// Parses the configured duration.
    pub fn duration_mode(&self) -> Result<DurationMode, ConfigError> {
        match &self.duration {
            None => Ok(DurationMode::PlayUntilEnd),
            Some(value) => {
                let duration: Duration = DurationString::from_string(value.clone())
                    .map_err(|e| ConfigError::InvalidDuration {
                        value: value.clone(),
                        reason: e.to_string(),
                    })?
                    .into();
                if duration.is_zero() {
                    return Err(ConfigError::InvalidDuration {
                        value: value.clone(),
                        reason: "duration must be greater than zero".to_string(),
                    });
                }
                Ok(DurationMode::FixedDuration(duration))
            }
        }
    }

    /// Clamps the volume into range.
    pub(super) fn normalize(&mut self) {
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            DEFAULT_VOLUME
        };
    }

    /// Returns a copy whose file is resolved against the given directory.
    pub fn resolved(&self, base: &Path) -> ClipSettings {
        ClipSettings {
            file: crate::util::resolve_path(base, &self.file),
            ..self.clone()
        }
    }

    pub fn with_volume(mut self, volume: f32) -> ClipSettings {
        self.volume = volume;
        self.normalize();
        self
    }

    pub fn with_fades(mut self, fade_in: Duration, fade_out: Duration) -> ClipSettings {
        self.fade_in_ms = fade_in.as_millis() as u64;
        self.fade_out_ms = fade_out.as_millis() as u64;
        self
    }

    pub fn with_interruptible(mut self, interruptible: bool) -> ClipSettings {
        self.interruptible = interruptible;
        self
    }

    pub fn with_repeat(mut self, repeat: RepeatBehavior) -> ClipSettings {
        self.repeat = repeat;
        self
    }

    pub fn with_duration(mut self, duration: Option<&str>) -> ClipSettings {
        self.duration = duration.map(str::to_string);
        self
    }
}
