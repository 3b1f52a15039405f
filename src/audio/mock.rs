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

use std::{error::Error, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::info;

#[cfg(test)]
use parking_lot::MutexGuard;

use super::mixer::Voice;

/// The sample rate used when the configuration doesn't name one.
const DEFAULT_MOCK_SAMPLE_RATE: u32 = 44100;

/// A voice the mock device was asked to play.
#[derive(Clone, Debug, PartialEq)]
pub struct StartedVoice {
    /// Number of frames in the voice.
    pub frames: usize,
    /// The gain the voice plays at.
    pub gain: f32,
}

/// A mock device. Doesn't actually play anything, only records what it was asked to play.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    started: Arc<Mutex<Vec<StartedVoice>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: Option<u32>) -> Device {
        Device {
            name: name.to_string(),
            sample_rate: sample_rate.unwrap_or(DEFAULT_MOCK_SAMPLE_RATE),
            started: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns every voice started so far, oldest first.
    #[cfg(test)]
    pub fn started(&self) -> MutexGuard<'_, Vec<StartedVoice>> {
        self.started.lock()
    }
}

impl super::Device for Device {
    fn start(&self, voice: Voice) -> Result<(), Box<dyn Error>> {
        info!(
            device = self.name,
            voice = voice.id(),
            frames = voice.frames(),
            gain = voice.gain(),
            "Starting voice."
        );
        self.started.lock().push(StartedVoice {
            frames: voice.frames(),
            gain: voice.gain(),
        });
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
