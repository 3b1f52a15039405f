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

use std::sync::Arc;

use tracing::{debug, error};

use crate::audio::{DecodedBuffer, Device, Voice};

/// The gain used when no usable gain is given.
pub const DEFAULT_GAIN: f32 = 0.5;

/// Squares the gain to give a steeper volume curve. A missing or zero result falls back to
/// [`DEFAULT_GAIN`], which is used as is.
pub fn effective_gain(gain: Option<f32>) -> f32 {
    let squared = gain.map(|gain| gain * gain).unwrap_or_default();
    if squared == 0.0 || squared.is_nan() {
        DEFAULT_GAIN
    } else {
        squared
    }
}

/// Plays decoded samples on the output device.
#[derive(Clone)]
pub struct NotePlayer {
    device: Arc<dyn Device>,
}

impl NotePlayer {
    /// Creates a player for the device.
    pub fn new(device: Arc<dyn Device>) -> NotePlayer {
        NotePlayer { device }
    }

    /// Returns the output device.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Starts the buffer playing immediately as a new voice. Every call is independent and
    /// runs to completion. Device errors are logged.
    pub fn play(&self, buffer: &DecodedBuffer, gain: Option<f32>) {
        let voice = Voice::new(buffer, effective_gain(gain));
        debug!(
            device = %self.device,
            voice = voice.id(),
            gain = voice.gain(),
            "Playing note"
        );
        if let Err(e) = self.device.start(voice) {
            error!(device = %self.device, err = %e, "Unable to play note");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;

    #[test]
    fn test_effective_gain() {
        assert_eq!(effective_gain(Some(0.5)), 0.25);
        assert_eq!(effective_gain(Some(1.0)), 1.0);
        assert_eq!(effective_gain(Some(0.0)), DEFAULT_GAIN);
        assert_eq!(effective_gain(None), DEFAULT_GAIN);
        assert_eq!(effective_gain(Some(f32::NAN)), DEFAULT_GAIN);
    }

    #[test]
    fn test_play_starts_independent_voices() {
        let device = Arc::new(mock::Device::get("mock-device", None));
        let player = NotePlayer::new(device.clone());
        let buffer = DecodedBuffer::new(vec![0.1; 100], 1, 44100);

        player.play(&buffer, Some(0.5));
        player.play(&buffer, None);

        let started = device.started();
        assert_eq!(
            *started,
            vec![
                mock::StartedVoice {
                    frames: 100,
                    gain: 0.25
                },
                mock::StartedVoice {
                    frames: 100,
                    gain: 0.5
                },
            ]
        );
    }
}
