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

//! Interaction handling for note bars.
//!
//! An interaction spawns a ripple at every contact point and derives the note volume from
//! the vertical position of the first one: bars are loudest when struck near the top.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

/// Padding added to both sides of the volume ratio so the bottom edge of a bar is quiet
/// rather than silent.
pub const GAIN_PAD: f64 = 20.0;

/// How long a ripple stays on its bar.
pub const RIPPLE_LIFETIME: Duration = Duration::from_millis(1000);

/// Global ripple ID counter.
static NEXT_RIPPLE_ID: AtomicU64 = AtomicU64::new(1);

/// Which input events the instrument handles. Chosen once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputModality {
    /// Touch-capable: every active touch point is reported in client coordinates.
    Touch,
    /// Pointer-only: a single point reported as an offset within the target.
    Pointer,
}

impl InputModality {
    /// Picks the modality for a platform.
    pub fn detect(touch_capable: bool) -> InputModality {
        if touch_capable {
            InputModality::Touch
        } else {
            InputModality::Pointer
        }
    }
}

/// The bounds of a note bar in client coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// An active touch point in client coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchPoint {
    pub client_x: f64,
    pub client_y: f64,
}

/// A press on a note bar.
#[derive(Clone, Debug, PartialEq)]
pub enum Interaction {
    /// A pointer press, as an offset from the bar's top-left corner.
    Pointer { offset_x: f64, offset_y: f64 },
    /// A touch start, with every touch point active on the bar.
    Touch { touches: Vec<TouchPoint> },
}

/// A transient marker drawn where a bar was struck.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ripple {
    id: u64,
    pub x: f64,
    pub y: f64,
}

impl Ripple {
    /// Returns the ripple ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A note to sound: which sample, and how loud.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoundTrigger {
    pub index: usize,
    pub gain: f64,
}

/// Maps a vertical offset within a bar of the given height to a gain.
///
/// Gives 1.0 at the top edge and `GAIN_PAD / (height + GAIN_PAD)` at the bottom edge.
pub fn gain_for_offset(height: f64, y: f64) -> f64 {
    ((height - y) + GAIN_PAD) / (height + GAIN_PAD)
}

/// A note bar. Its index is fixed at construction and matches the sample load order.
pub struct NoteElement {
    index: usize,
    bounds: Rect,
    ripples: Arc<Mutex<Vec<Ripple>>>,
}

impl NoteElement {
    /// Creates a new note bar.
    pub fn new(index: usize, bounds: Rect) -> NoteElement {
        NoteElement {
            index,
            bounds,
            ripples: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the sample index of this bar.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the bar's bounds.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Returns the ripples currently on the bar.
    pub fn ripples(&self) -> Vec<Ripple> {
        self.ripples.lock().clone()
    }

    /// Places a ripple at the offset and schedules its removal after `RIPPLE_LIFETIME`.
    /// Every ripple is timed independently. Must be called within a Tokio runtime.
    pub fn spawn_ripple(&self, x: f64, y: f64) -> Ripple {
        let ripple = Ripple {
            id: NEXT_RIPPLE_ID.fetch_add(1, Ordering::Relaxed),
            x,
            y,
        };
        self.ripples.lock().push(ripple);

        let ripples = self.ripples.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RIPPLE_LIFETIME).await;
            ripples.lock().retain(|r| r.id != ripple.id);
        });

        ripple
    }
}

/// Turns interactions into ripples and sound triggers, using the modality fixed at startup.
pub struct RippleTrigger {
    modality: InputModality,
}

impl RippleTrigger {
    /// Creates a trigger for the given modality.
    pub fn new(modality: InputModality) -> RippleTrigger {
        RippleTrigger { modality }
    }

    /// Returns the modality this trigger handles.
    pub fn modality(&self) -> InputModality {
        self.modality
    }

    /// Returns the offset of every ripple the interaction produces: one per touch point in
    /// touch mode, one in pointer mode. Events of the other modality produce nothing.
    pub fn ripple_offsets(&self, bounds: Rect, interaction: &Interaction) -> Vec<(f64, f64)> {
        match (self.modality, interaction) {
            (InputModality::Touch, Interaction::Touch { touches }) => touches
                .iter()
                .map(|touch| (touch.client_x - bounds.left, touch.client_y - bounds.top))
                .collect(),
            (InputModality::Pointer, Interaction::Pointer { offset_x, offset_y }) => {
                vec![(*offset_x, *offset_y)]
            }
            _ => {
                debug!(
                    modality = ?self.modality,
                    "Ignoring interaction of the other modality"
                );
                Vec::new()
            }
        }
    }

    /// Returns the note to sound for the interaction. Only the first touch point counts, no
    /// matter how many are active.
    pub fn sound_trigger(
        &self,
        element: &NoteElement,
        interaction: &Interaction,
    ) -> Option<SoundTrigger> {
        let bounds = element.bounds();
        let y = match (self.modality, interaction) {
            (InputModality::Touch, Interaction::Touch { touches }) => {
                touches.first()?.client_y - bounds.top
            }
            (InputModality::Pointer, Interaction::Pointer { offset_y, .. }) => *offset_y,
            _ => return None,
        };

        Some(SoundTrigger {
            index: element.index(),
            gain: gain_for_offset(bounds.height, y),
        })
    }

    /// Ripples the element at every contact point and returns the note to sound, if any.
    pub fn on_interaction(
        &self,
        element: &NoteElement,
        interaction: &Interaction,
    ) -> Option<SoundTrigger> {
        for (x, y) in self.ripple_offsets(element.bounds(), interaction) {
            element.spawn_ripple(x, y);
        }
        self.sound_trigger(element, interaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAR: Rect = Rect {
        left: 120.0,
        top: 10.0,
        width: 60.0,
        height: 100.0,
    };

    fn touch(x: f64, y: f64) -> TouchPoint {
        TouchPoint {
            client_x: x,
            client_y: y,
        }
    }

    #[test]
    fn test_gain_for_offset() {
        assert!((gain_for_offset(100.0, 0.0) - 1.0).abs() < 1e-9);
        assert!((gain_for_offset(100.0, 100.0) - 20.0 / 120.0).abs() < 1e-9);
        assert!((gain_for_offset(100.0, 100.0) - 0.1667).abs() < 1e-4);
        assert!((gain_for_offset(100.0, 50.0) - 0.5833).abs() < 1e-4);
    }

    #[test]
    fn test_detect() {
        assert_eq!(InputModality::detect(true), InputModality::Touch);
        assert_eq!(InputModality::detect(false), InputModality::Pointer);
    }

    #[test]
    fn test_pointer_uses_offset() {
        let trigger = RippleTrigger::new(InputModality::Pointer);
        let element = NoteElement::new(3, BAR);
        let interaction = Interaction::Pointer {
            offset_x: 15.0,
            offset_y: 50.0,
        };

        assert_eq!(trigger.ripple_offsets(BAR, &interaction), vec![(15.0, 50.0)]);
        let sound = trigger.sound_trigger(&element, &interaction).unwrap();
        assert_eq!(sound.index, 3);
        assert!((sound.gain - 70.0 / 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_touch_maps_client_coordinates() {
        let trigger = RippleTrigger::new(InputModality::Touch);
        let element = NoteElement::new(0, BAR);
        let interaction = Interaction::Touch {
            touches: vec![touch(130.0, 10.0), touch(150.0, 60.0), touch(170.0, 110.0)],
        };

        assert_eq!(
            trigger.ripple_offsets(BAR, &interaction),
            vec![(10.0, 0.0), (30.0, 50.0), (50.0, 100.0)]
        );
        // Only the first touch point sounds, at the top of the bar.
        let sound = trigger.sound_trigger(&element, &interaction).unwrap();
        assert!((sound.gain - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_other_modality_ignored() {
        let trigger = RippleTrigger::new(InputModality::Pointer);
        let element = NoteElement::new(0, BAR);
        let interaction = Interaction::Touch {
            touches: vec![touch(130.0, 10.0)],
        };

        assert!(trigger.ripple_offsets(BAR, &interaction).is_empty());
        assert!(trigger.sound_trigger(&element, &interaction).is_none());
    }

    #[test]
    fn test_touch_without_points() {
        let trigger = RippleTrigger::new(InputModality::Touch);
        let element = NoteElement::new(0, BAR);
        let interaction = Interaction::Touch { touches: vec![] };

        assert!(trigger.ripple_offsets(BAR, &interaction).is_empty());
        assert!(trigger.sound_trigger(&element, &interaction).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ripples_expire_independently() {
        let element = NoteElement::new(0, BAR);

        element.spawn_ripple(1.0, 1.0);
        tokio::time::sleep(Duration::from_millis(400)).await;
        let second = element.spawn_ripple(2.0, 2.0);
        assert_eq!(element.ripples().len(), 2);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(element.ripples(), vec![second]);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(element.ripples().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_interaction_ripples_every_point() {
        let trigger = RippleTrigger::new(InputModality::Touch);
        let element = NoteElement::new(2, BAR);
        let interaction = Interaction::Touch {
            touches: vec![touch(130.0, 60.0), touch(140.0, 20.0), touch(150.0, 100.0)],
        };

        let sound = trigger.on_interaction(&element, &interaction);
        assert_eq!(element.ripples().len(), 3);
        assert_eq!(sound.map(|s| s.index), Some(2));

        tokio::time::sleep(RIPPLE_LIFETIME + Duration::from_millis(1)).await;
        assert!(element.ripples().is_empty());
    }
}
