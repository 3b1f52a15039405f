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

use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, Level};

use super::mixer::{AudioMixer, Voice};
use crate::{audio::Device as AudioDevice, config};

/// A small wrapper around a cpal::Device that owns the continuous output stream all
/// voices are mixed into.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The sample rate of the output stream.
    sample_rate: u32,
    /// The running output stream. Listed devices don't have one.
    output: Option<OutputManager>,
}

/// Manages the continuous output stream.
struct OutputManager {
    /// Channel for handing new voices to the audio callback.
    voice_tx: Sender<Voice>,
    /// Cleared to stop the output thread.
    running: Arc<AtomicBool>,
    /// Handle to the output thread (keeps the stream alive).
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Builds the audio callback. New voices are drained from the channel before every block so
/// that a voice starts on the very next block after it's sent.
fn create_callback<T>(
    mixer: AudioMixer,
    voice_rx: Receiver<Voice>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        while let Ok(voice) = voice_rx.try_recv() {
            mixer.add_voice(voice);
        }

        scratch.resize(data.len(), 0.0);
        mixer.process_into_output(&mut scratch);

        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl OutputManager {
    /// Starts the output thread that creates and owns the CPAL stream. Returns once the stream
    /// is playing or has failed to start.
    fn start(
        device: cpal::Device,
        stream_config: cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
    ) -> Result<OutputManager, Box<dyn Error>> {
        let (voice_tx, voice_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let running = Arc::new(AtomicBool::new(true));
        let mixer = AudioMixer::new(stream_config.channels, stream_config.sample_rate.0);

        let thread_running = running.clone();
        let output_thread = thread::spawn(move || {
            let err_fn = |err| error!("CPAL output stream error: {}", err);
            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => device.build_output_stream(
                    &stream_config,
                    create_callback::<f32>(mixer, voice_rx),
                    err_fn,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_output_stream(
                    &stream_config,
                    create_callback::<i16>(mixer, voice_rx),
                    err_fn,
                    None,
                ),
                cpal::SampleFormat::I32 => device.build_output_stream(
                    &stream_config,
                    create_callback::<i32>(mixer, voice_rx),
                    err_fn,
                    None,
                ),
                cpal::SampleFormat::U16 => device.build_output_stream(
                    &stream_config,
                    create_callback::<u16>(mixer, voice_rx),
                    err_fn,
                    None,
                ),
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
                    return;
                }
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create CPAL stream: {}", e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start CPAL stream: {}", e)));
                return;
            }
            info!("CPAL output stream started successfully");
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until the manager is dropped.
            while thread_running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(100));
            }
        });

        ready_rx.recv()??;

        Ok(OutputManager {
            voice_tx,
            running,
            output_thread: Some(output_thread),
        })
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    let sample_rate = device
                        .default_output_config()
                        .map(|config| config.sample_rate().0)
                        .unwrap_or(0);
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        sample_rate,
                        output: None,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device and starts its output stream.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let span = span!(Level::INFO, "open device (cpal)");
        let _enter = span.enter();

        let name = config.device();
        let mut device = Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| format!("no device found with name {}", name))?;

        let default_config = device.device.default_output_config()?;
        let sample_rate = config
            .sample_rate()
            .unwrap_or(default_config.sample_rate().0);
        let stream_config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            device = device.name,
            channels = stream_config.channels,
            sample_rate,
            "Opening output stream."
        );
        device.output = Some(OutputManager::start(
            device.device.clone(),
            stream_config,
            default_config.sample_format(),
        )?);
        device.sample_rate = sample_rate;

        Ok(device)
    }
}

impl AudioDevice for Device {
    fn start(&self, voice: Voice) -> Result<(), Box<dyn Error>> {
        match &self.output {
            Some(output) => Ok(output.voice_tx.send(voice)?),
            None => Err(format!("device {} has no running output stream", self.name).into()),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
