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

//! Note samples: fetching and decoding them, and playing them back.

mod loader;
mod player;

use crate::audio::DecodedBuffer;

pub use loader::{Decode, LoadError, SampleError, SampleLoader, SymphoniaDecoder};
pub use player::{effective_gain, NotePlayer, DEFAULT_GAIN};

/// The decoded samples, index-aligned with the locators they were loaded from.
#[derive(Clone, Debug, Default)]
pub struct SampleSession {
    buffers: Vec<DecodedBuffer>,
}

impl SampleSession {
    /// Creates a session over the buffers.
    pub fn new(buffers: Vec<DecodedBuffer>) -> SampleSession {
        SampleSession { buffers }
    }

    /// Gets the buffer for the note index.
    pub fn get(&self, index: usize) -> Option<&DecodedBuffer> {
        self.buffers.get(index)
    }

    /// Returns the number of buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if there are no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Returns every buffer in note order.
    pub fn buffers(&self) -> &[DecodedBuffer] {
        &self.buffers
    }

    /// Returns the total decoded size in bytes.
    pub fn memory_size(&self) -> usize {
        self.buffers.iter().map(DecodedBuffer::memory_size).sum()
    }
}
