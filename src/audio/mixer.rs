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

// Mixes independent note voices into the shared output destination.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::buffer::DecodedBuffer;

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// A single playback of a decoded buffer at a fixed gain. This is the source and gain node
/// pair of one note: created per play, never shared, and dropped once it has run out of frames.
pub struct Voice {
    /// Unique ID for this voice.
    id: u64,
    /// The shared sample data.
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample data.
    channel_count: usize,
    /// The next frame to play.
    position: usize,
    /// Linear gain applied to every sample.
    gain: f32,
}

impl Voice {
    /// Creates a voice that plays the buffer from the start at the given gain.
    pub fn new(buffer: &DecodedBuffer, gain: f32) -> Voice {
        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed),
            data: buffer.data().clone(),
            channel_count: buffer.channel_count() as usize,
            position: 0,
            gain,
        }
    }

    /// Returns the voice ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the gain this voice plays at.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Returns the total number of frames in this voice.
    pub fn frames(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.data.len() / self.channel_count
    }

    /// Returns true once every frame has been played.
    pub fn is_finished(&self) -> bool {
        self.position >= self.frames()
    }

    /// Adds as many frames as fit into the interleaved output buffer. Mono voices are copied
    /// to every output channel; multichannel voices map channel to channel and drop any
    /// channel the output doesn't have.
    fn mix_into(&mut self, output: &mut [f32], output_channels: usize) {
        let frames = self.frames();
        for out_frame in output.chunks_exact_mut(output_channels) {
            if self.position >= frames {
                break;
            }
            let start = self.position * self.channel_count;
            let frame = &self.data[start..start + self.channel_count];
            for (channel, sample) in out_frame.iter_mut().enumerate() {
                let source = if self.channel_count == 1 {
                    frame[0]
                } else if channel < self.channel_count {
                    frame[channel]
                } else {
                    continue;
                };
                *sample += source * self.gain;
            }
            self.position += 1;
        }
    }
}

/// Sums every active voice into the output. All play invocations share this one destination.
#[derive(Clone)]
pub struct AudioMixer {
    /// Voices currently playing.
    voices: Arc<RwLock<Vec<Voice>>>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            voices: Arc::new(RwLock::new(Vec::new())),
            num_channels,
            sample_rate,
        }
    }

    /// Adds a voice. It starts on the next processed block.
    pub fn add_voice(&self, voice: Voice) {
        self.voices.write().push(voice);
    }

    /// Returns the number of voices still playing.
    pub fn active_count(&self) -> usize {
        self.voices.read().len()
    }

    /// Mixes the next block of interleaved frames into `output`, overwriting its contents.
    /// Voices that run out of frames are removed.
    pub fn process_into_output(&self, output: &mut [f32]) {
        output.fill(0.0);
        let channels = self.num_channels.max(1) as usize;

        let mut voices = self.voices.write();
        voices.retain_mut(|voice| {
            voice.mix_into(output, channels);
            !voice.is_finished()
        });
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_voice_fans_out_with_gain() {
        let mixer = AudioMixer::new(2, 44100);
        let buffer = DecodedBuffer::new(vec![1.0, 0.5], 1, 44100);
        mixer.add_voice(Voice::new(&buffer, 0.25));

        let mut output = vec![0.0f32; 6];
        mixer.process_into_output(&mut output);

        assert_eq!(output, vec![0.25, 0.25, 0.125, 0.125, 0.0, 0.0]);
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_voices_sum() {
        let mixer = AudioMixer::new(1, 44100);
        let buffer = DecodedBuffer::new(vec![0.5; 4], 1, 44100);
        mixer.add_voice(Voice::new(&buffer, 1.0));
        mixer.add_voice(Voice::new(&buffer, 0.5));

        let mut output = vec![0.0f32; 2];
        mixer.process_into_output(&mut output);

        assert_eq!(output, vec![0.75, 0.75]);
        assert_eq!(mixer.active_count(), 2);

        mixer.process_into_output(&mut output);
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_stereo_voice_into_mono_output_drops_extra_channel() {
        let mixer = AudioMixer::new(1, 44100);
        let buffer = DecodedBuffer::new(vec![0.2, 0.9, 0.4, 0.9], 2, 44100);
        mixer.add_voice(Voice::new(&buffer, 1.0));

        let mut output = vec![0.0f32; 2];
        mixer.process_into_output(&mut output);
        assert_eq!(output, vec![0.2, 0.4]);
    }

    #[test]
    fn test_voice_ids_are_unique() {
        let buffer = DecodedBuffer::new(vec![0.0; 2], 1, 44100);
        let first = Voice::new(&buffer, 1.0);
        let second = Voice::new(&buffer, 1.0);
        assert_ne!(first.id(), second.id());
    }
}
