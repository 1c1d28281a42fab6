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
use std::path::PathBuf;

use crate::audio::sample_source::SampleSourceError;
use crate::config::ConfigError;

/// Reasons a clip did not start.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("clip file {0} does not exist")]
    MissingClip(PathBuf),

    #[error("invalid clip settings: {0}")]
    Config(#[from] ConfigError),

    #[error("unable to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: SampleSourceError,
    },

    #[error("no output could be opened for {0}")]
    NoOutput(String),
}
