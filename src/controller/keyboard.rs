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

use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::ripple::{InputModality, Interaction, TouchPoint};

const QUIT: &str = "quit";

/// A driver that strikes notes from lines typed on the keyboard. Notes are numbered from 1.
///
/// In pointer mode a line is `<note> <x> <y>`, the offset within the bar. In touch mode it is
/// `<note> <x,y> [<x,y> ...]`, one client position per touch point.
pub struct Driver {
    modality: InputModality,
}

impl Driver {
    pub fn new(modality: InputModality) -> Driver {
        Driver { modality }
    }

    /// Reads one line and sends its event. Returns false once input is finished.
    fn monitor_io<R, W>(
        modality: InputModality,
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        match modality {
            InputModality::Pointer => write!(writer, "Strike (<note> <x> <y>, {}): ", QUIT)?,
            InputModality::Touch => {
                write!(writer, "Strike (<note> <x,y> [<x,y> ...], {}): ", QUIT)?
            }
        }
        writer.flush()?;

        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let input = input.trim();
        if input.eq_ignore_ascii_case(QUIT) {
            return Ok(false);
        }

        match parse_strike(modality, input) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => warn!(input, "Unrecognized input"),
        }
        Ok(true)
    }
}

/// Parses a strike line for the modality.
fn parse_strike(modality: InputModality, input: &str) -> Option<Event> {
    let mut fields = input.split_whitespace();
    let note = fields.next()?.parse::<usize>().ok()?.checked_sub(1)?;

    let interaction = match modality {
        InputModality::Pointer => {
            let offset_x = fields.next()?.parse().ok()?;
            let offset_y = fields.next()?.parse().ok()?;
            if fields.next().is_some() {
                return None;
            }
            Interaction::Pointer { offset_x, offset_y }
        }
        InputModality::Touch => Interaction::Touch {
            touches: fields.map(parse_point).collect::<Option<Vec<_>>>()?,
        },
    };

    Some(Event::Strike { note, interaction })
}

fn parse_point(field: &str) -> Option<TouchPoint> {
    let (x, y) = field.split_once(',')?;
    Some(TouchPoint {
        client_x: x.parse().ok()?,
        client_y: y.parse().ok()?,
    })
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let modality = self.modality;
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!(modality = ?modality, "Keyboard driver started.");

            while Self::monitor_io(modality, &events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard input finished.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::{keyboard::*, Event};

    use super::Driver;

    fn get_event(modality: InputModality, line: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(line.as_bytes());
        let writer = BufWriter::new(Vec::<u8>::new());
        assert!(Driver::monitor_io(modality, &sender, reader, writer)?);

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    fn touch(x: f64, y: f64) -> TouchPoint {
        TouchPoint {
            client_x: x,
            client_y: y,
        }
    }

    #[test]
    fn test_pointer_events() -> Result<(), io::Error> {
        assert_eq!(
            Some(Event::Strike {
                note: 2,
                interaction: Interaction::Pointer {
                    offset_x: 10.0,
                    offset_y: 42.5
                }
            }),
            get_event(InputModality::Pointer, "3 10 42.5\n")?
        );
        assert_eq!(None, get_event(InputModality::Pointer, "3 10\n")?);
        assert_eq!(None, get_event(InputModality::Pointer, "3 10 20 30\n")?);
        assert_eq!(None, get_event(InputModality::Pointer, "0 10 20\n")?);
        assert_eq!(None, get_event(InputModality::Pointer, "unrecognized\n")?);
        Ok(())
    }

    #[test]
    fn test_touch_events() -> Result<(), io::Error> {
        assert_eq!(
            Some(Event::Strike {
                note: 0,
                interaction: Interaction::Touch {
                    touches: vec![touch(10.0, 20.0), touch(30.0, 40.0)]
                }
            }),
            get_event(InputModality::Touch, "1 10,20 30,40\n")?
        );
        assert_eq!(
            Some(Event::Strike {
                note: 0,
                interaction: Interaction::Touch { touches: vec![] }
            }),
            get_event(InputModality::Touch, "1\n")?
        );
        assert_eq!(None, get_event(InputModality::Touch, "1 10 20\n")?);
        Ok(())
    }

    #[test]
    fn test_quit_and_end_of_input() -> Result<(), io::Error> {
        let (sender, _receiver) = mpsc::channel::<Event>(1);
        let writer = BufWriter::new(Vec::<u8>::new());
        assert!(!Driver::monitor_io(
            InputModality::Pointer,
            &sender,
            BufReader::new("quit\n".as_bytes()),
            writer,
        )?);

        let writer = BufWriter::new(Vec::<u8>::new());
        assert!(!Driver::monitor_io(
            InputModality::Touch,
            &sender,
            BufReader::new("".as_bytes()),
            writer,
        )?);
        Ok(())
    }
}
