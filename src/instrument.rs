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

//! The instrument: a row of note bars, each bound to the sample at its index.

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::Layout;
use crate::ripple::{InputModality, Interaction, NoteElement, Rect, RippleTrigger, SoundTrigger};
use crate::samples::{NotePlayer, SampleSession};

/// The note bars, the input handling for them and the sounds they play.
pub struct Xylophone {
    notes: Vec<NoteElement>,
    trigger: RippleTrigger,
    player: NotePlayer,
    session: RwLock<SampleSession>,
}

impl Xylophone {
    /// Creates one note bar per sample, laid out left to right. No sound plays until a
    /// session is attached.
    pub fn new(
        sample_count: usize,
        layout: &Layout,
        modality: InputModality,
        player: NotePlayer,
    ) -> Xylophone {
        let notes = (0..sample_count)
            .map(|index| {
                NoteElement::new(
                    index,
                    Rect {
                        left: index as f64 * layout.note_width(),
                        top: 0.0,
                        width: layout.note_width(),
                        height: layout.note_height(),
                    },
                )
            })
            .collect();

        Xylophone {
            notes,
            trigger: RippleTrigger::new(modality),
            player,
            session: RwLock::new(SampleSession::default()),
        }
    }

    /// Makes the loaded samples playable.
    pub fn attach_session(&self, session: SampleSession) {
        debug!(samples = session.len(), "Attaching sample session");
        *self.session.write() = session;
    }

    /// Returns true once every note has a sample.
    pub fn is_ready(&self) -> bool {
        self.session.read().len() >= self.notes.len()
    }

    /// Returns the input modality.
    pub fn modality(&self) -> InputModality {
        self.trigger.modality()
    }

    /// Returns every note bar.
    pub fn notes(&self) -> &[NoteElement] {
        &self.notes
    }

    /// Returns the note bar at the index.
    pub fn note(&self, index: usize) -> Option<&NoteElement> {
        self.notes.get(index)
    }

    /// Handles an interaction on the note bar at the index. Ripples always show; the note
    /// only sounds once the samples are loaded. Returns the sound the interaction produced.
    pub fn interact(&self, index: usize, interaction: &Interaction) -> Option<SoundTrigger> {
        let Some(note) = self.notes.get(index) else {
            warn!(index, notes = self.notes.len(), "No such note");
            return None;
        };

        let sound = self.trigger.on_interaction(note, interaction)?;
        let session = self.session.read();
        if session.len() < self.notes.len() {
            debug!(index, "Samples not loaded yet, skipping sound");
            return Some(sound);
        }

        if let Some(buffer) = session.get(sound.index) {
            self.player.play(buffer, Some(sound.gain as f32));
        }
        Some(sound)
    }
}
