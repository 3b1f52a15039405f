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

use std::error::Error;
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, info_span, Instrument};

use crate::instrument::Xylophone;
use crate::ripple::Interaction;

pub mod keyboard;

/// Controller events that will trigger behavior in the instrument.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Strikes the note bar at the index.
    Strike {
        note: usize,
        interaction: Interaction,
    },
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Plays the instrument from a driver's events.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(
        xylophone: Arc<Xylophone>,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(
                Controller::trigger_events(xylophone, driver).instrument(info_span!("controller")),
            ),
        })
    }

    /// Join will block until the driver stops sending events.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Strikes notes by watching the driver and getting events from it.
    async fn trigger_events(xylophone: Arc<Xylophone>, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(
            notes = xylophone.notes().len(),
            modality = ?xylophone.modality(),
            "Controller started."
        );

        while let Some(event) = events_rx.recv().await {
            debug!(event = ?event, "Received event.");
            match event {
                Event::Strike { note, interaction } => {
                    match xylophone.interact(note, &interaction) {
                        Some(sound) => info!(note, gain = sound.gain, "Struck note."),
                        None => debug!(note, "Strike produced no sound."),
                    }
                }
            }
        }

        info!("Controller closing.");
        match join_handle.await {
            Ok(Err(e)) => error!(err = %e, "Event monitor failed"),
            Err(e) => error!(err = %e, "Error waiting for event monitor to stop"),
            Ok(Ok(())) => {}
        }
    }
}
