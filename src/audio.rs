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

use std::any::Any;
use std::{error::Error, fmt, sync::Arc};

use crate::config;

pub mod buffer;
pub mod cpal;
pub mod decode;
pub mod mixer;
pub mod mock;

pub use buffer::DecodedBuffer;
pub use mixer::{AudioMixer, Voice};

/// An audio output destination. Every started voice is mixed into the device's single
/// output stream.
pub trait Device: Any + fmt::Display + std::marker::Send + std::marker::Sync {
    /// Starts playing the voice immediately. Voices run to completion.
    fn start(&self, voice: Voice) -> Result<(), Box<dyn Error>>;

    /// The sample rate of the device output. Decoded buffers are transcoded to this rate.
    fn sample_rate(&self) -> u32;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name. Names starting with "mock" produce a mock device.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, config.sample_rate())));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::NotePlayer;

    #[test]
    fn test_get_mock_device() -> Result<(), Box<dyn Error>> {
        let device = get_device(&config::Audio::new("mock-device"))?;
        assert_eq!(device.sample_rate(), 44100);
        assert_eq!(device.to_string(), "mock-device (Mock)");

        // Voices started through a player land on the same mock.
        let mock = device.to_mock()?;
        NotePlayer::new(device).play(&DecodedBuffer::new(vec![0.5; 4], 1, 44100), Some(1.0));
        assert_eq!(mock.started().len(), 1);
        Ok(())
    }
}
