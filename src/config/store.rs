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

use parking_lot::Mutex;
use tracing::info;

use super::error::ConfigError;
use super::App;

/// Persists settings changed at runtime.
pub trait SettingsStore: Send + Sync {
    /// Records whether the listener is enabled.
    fn save_listener_enabled(&self, enabled: bool) -> Result<(), ConfigError>;
}

/// A settings store backed by the YAML file the app config was loaded from.
pub struct FileStore {
    path: PathBuf,
    app: Mutex<App>,
}

impl FileStore {
    /// Loads and validates the app config at the given path.
    pub fn load(path: &Path) -> Result<FileStore, ConfigError> {
        Ok(FileStore {
            path: path.to_path_buf(),
            app: Mutex::new(App::deserialize(path)?),
        })
    }

    /// A snapshot of the current app config.
    pub fn app(&self) -> App {
        self.app.lock().clone()
    }

    /// Re-reads the config file. The previous config is kept if the file no longer loads.
    pub fn reload(&self) -> Result<App, ConfigError> {
        let app = App::deserialize(&self.path)?;
        *self.app.lock() = app.clone();
        info!(path = self.path.display().to_string(), "Reloaded config");
        Ok(app)
    }
}

impl SettingsStore for FileStore {
    fn save_listener_enabled(&self, enabled: bool) -> Result<(), ConfigError> {
        let mut app = self.app.lock();
        if app.global().listener_enabled() == enabled {
            return Ok(());
        }
        app.global_mut().set_listener_enabled(enabled);
        app.save(&self.path)?;
        info!(
            path = self.path.display().to_string(),
            enabled, "Saved listener state"
        );
        Ok(())
    }
}
