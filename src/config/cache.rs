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

use serde::Deserialize;

/// Default cache namespace. Every store under this prefix belongs to the instrument.
pub const DEFAULT_NAMESPACE: &str = "xylophone";

/// Default cache version.
pub const DEFAULT_VERSION: &str = "v1.0.0";

/// The page shell, stylesheet and script, cached ahead of the samples.
const SHELL_ASSETS: [&str; 3] = ["./style.css", "./", "./app.js"];

/// The web manifest and icons, cached after the samples.
const MANIFEST_ASSETS: [&str; 3] = [
    "./manifest.json",
    "images/xylophone.png",
    "images/xylophone.svg",
];

/// A YAML representation of the offline cache configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Cache {
    /// The namespace shared by every version of the store.
    namespace: Option<String>,

    /// The current version. Stores with the same namespace and another version are stale.
    version: Option<String>,

    /// A directory for persistent stores. Without one, stores live in memory.
    dir: Option<String>,

    /// The complete asset list installed into the store. Defaults to the page shell, every
    /// sample, the manifest and the icons.
    assets: Option<Vec<String>>,
}

impl Cache {
    /// Returns the cache namespace.
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Returns the cache version.
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    /// Returns the persistent store directory, if configured.
    pub fn dir(&self) -> Option<&str> {
        self.dir.as_deref()
    }

    /// Returns the assets to install, given the configured samples.
    pub fn assets(&self, samples: &[String]) -> Vec<String> {
        if let Some(assets) = &self.assets {
            return assets.clone();
        }

        SHELL_ASSETS
            .iter()
            .map(|asset| asset.to_string())
            .chain(samples.iter().cloned())
            .chain(MANIFEST_ASSETS.iter().map(|asset| asset.to_string()))
            .collect()
    }
}
