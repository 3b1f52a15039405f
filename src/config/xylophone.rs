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

use config::{Config, File};
use serde::Deserialize;

use super::audio::Audio;
use super::cache::Cache;
use super::error::ConfigError;
use super::DEFAULT_SAMPLES;
use crate::ripple::InputModality;

/// Default origin the asset root is served as.
const DEFAULT_ORIGIN: &str = "http://localhost";

/// Default note bar width, in pixels.
const DEFAULT_NOTE_WIDTH: f64 = 60.0;

/// Default note bar height, in pixels.
const DEFAULT_NOTE_HEIGHT: f64 = 300.0;

/// Strikes only arrive through the keyboard driver, which has no touch points.
const KEYBOARD_TOUCH_CAPABLE: bool = false;

/// How the instrument decides between touch and pointer input.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputSetting {
    /// Detect the modality at startup. The keyboard driver is the only input source and it
    /// can't report touches, so this always resolves to pointer.
    #[default]
    Auto,
    /// Always use touch handling.
    Touch,
    /// Always use pointer handling.
    Pointer,
}

impl InputSetting {
    /// Resolves the setting to the fixed modality used for the whole session.
    pub fn modality(&self) -> InputModality {
        match self {
            InputSetting::Auto => InputModality::detect(KEYBOARD_TOUCH_CAPABLE),
            InputSetting::Touch => InputModality::Touch,
            InputSetting::Pointer => InputModality::Pointer,
        }
    }
}

/// The size of each note bar. Bars are laid out left to right in sample order.
#[derive(Deserialize, Clone, Debug)]
pub struct Layout {
    #[serde(default = "default_note_width")]
    note_width: f64,
    #[serde(default = "default_note_height")]
    note_height: f64,
}

fn default_note_width() -> f64 {
    DEFAULT_NOTE_WIDTH
}

fn default_note_height() -> f64 {
    DEFAULT_NOTE_HEIGHT
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            note_width: DEFAULT_NOTE_WIDTH,
            note_height: DEFAULT_NOTE_HEIGHT,
        }
    }
}

impl Layout {
    /// Returns the width of a note bar.
    pub fn note_width(&self) -> f64 {
        self.note_width
    }

    /// Returns the height of a note bar.
    pub fn note_height(&self) -> f64 {
        self.note_height
    }
}

/// The configuration for the instrument.
#[derive(Deserialize, Clone, Debug)]
pub struct Xylophone {
    /// The directory served as the instrument's origin.
    assets: String,

    /// The origin the asset directory is served as.
    origin: Option<String>,

    /// The ordered sample locators. A sample's index is the index of its note bar.
    samples: Option<Vec<String>>,

    /// The audio output configuration.
    audio: Audio,

    /// The offline cache configuration.
    #[serde(default)]
    cache: Cache,

    /// The input modality.
    #[serde(default)]
    input: InputSetting,

    /// The note bar layout.
    #[serde(default)]
    layout: Layout,
}

impl Xylophone {
    /// Parses the instrument configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Xylophone, ConfigError> {
        let xylophone = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Xylophone>()?;
        xylophone.validate()?;
        Ok(xylophone)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.samples().is_empty() {
            return Err(ConfigError::Invalid("no samples configured".to_string()));
        }
        if self.layout.note_height <= 0.0 || self.layout.note_width <= 0.0 {
            return Err(ConfigError::Invalid(
                "note bars must have a positive size".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the asset directory. Relative paths are resolved against `base`, normally the
    /// directory holding the config file.
    pub fn assets_path(&self, base: &Path) -> PathBuf {
        let assets = Path::new(&self.assets);
        if assets.is_absolute() {
            assets.to_path_buf()
        } else {
            base.join(assets)
        }
    }

    /// Returns the origin name.
    pub fn origin(&self) -> &str {
        self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN)
    }

    /// Returns the sample locators.
    pub fn samples(&self) -> Vec<String> {
        match &self.samples {
            Some(samples) => samples.clone(),
            None => DEFAULT_SAMPLES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the cache configuration.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Returns the input setting.
    pub fn input(&self) -> InputSetting {
        self.input
    }

    /// Returns the note layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Xylophone {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config() {
        let xylophone = parse(
            r#"
            assets: public
            audio:
              device: mock-device
        "#,
        );

        assert_eq!(xylophone.origin(), "http://localhost");
        assert_eq!(xylophone.samples().len(), 8);
        assert_eq!(xylophone.samples()[0], "./note/1.mp3");
        assert_eq!(xylophone.audio().device(), "mock-device");
        assert_eq!(xylophone.audio().sample_rate(), None);
        assert_eq!(xylophone.input(), InputSetting::Auto);
        assert_eq!(xylophone.input().modality(), InputModality::Pointer);
        assert_eq!(xylophone.layout().note_height(), 300.0);
        assert_eq!(xylophone.cache().namespace(), "xylophone");
        assert_eq!(
            xylophone.assets_path(Path::new("/etc/xylophone")),
            PathBuf::from("/etc/xylophone/public")
        );
    }

    #[test]
    fn test_full_config() {
        let xylophone = parse(
            r#"
            assets: /srv/xylophone
            origin: https://xylophone.example
            samples:
              - ./note/low.wav
              - ./note/high.wav
            audio:
              device: mock-device
              sample_rate: 48000
            cache:
              namespace: xylo
              version: v2
              dir: /var/cache/xylophone
            input: touch
            layout:
              note_width: 40
              note_height: 100
        "#,
        );

        assert_eq!(xylophone.origin(), "https://xylophone.example");
        assert_eq!(xylophone.samples(), vec!["./note/low.wav", "./note/high.wav"]);
        assert_eq!(xylophone.audio().sample_rate(), Some(48000));
        assert_eq!(xylophone.cache().namespace(), "xylo");
        assert_eq!(xylophone.cache().version(), "v2");
        assert_eq!(xylophone.cache().dir(), Some("/var/cache/xylophone"));
        assert_eq!(xylophone.input().modality(), InputModality::Touch);
        assert_eq!(xylophone.layout().note_width(), 40.0);
        assert_eq!(
            xylophone.assets_path(Path::new("/elsewhere")),
            PathBuf::from("/srv/xylophone")
        );
        assert!(xylophone.validate().is_ok());
    }

    #[test]
    fn test_empty_samples_rejected() {
        let xylophone = parse(
            r#"
            assets: public
            samples: []
            audio:
              device: mock-device
        "#,
        );

        assert!(matches!(
            xylophone.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }
}
