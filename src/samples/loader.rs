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

//! Fetches and decodes note samples.
//!
//! Every locator is fetched and decoded independently. The completion callback of
//! [`SampleLoader::load`] fires exactly once, with the full index-aligned list, when the
//! last sample finishes decoding, whatever order they finish in. A sample that fails is
//! logged and never counted, so completion never fires. [`SampleLoader::load_all`] reports
//! those failures instead.

use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::SampleSession;
use crate::audio::decode::{decode_audio_data, DecodeError};
use crate::audio::DecodedBuffer;
use crate::cache::{FetchError, Network, Origin, Request};

/// Why a single sample failed to load.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("unable to fetch {locator}: {source}")]
    Transport {
        locator: String,
        #[source]
        source: FetchError,
    },

    #[error("error decoding file data {locator}: {source}")]
    Decode {
        locator: String,
        #[source]
        source: DecodeError,
    },

    #[error("no audio decoded from {0}")]
    NoBuffer(String),

    #[error("loading {0} was aborted")]
    Aborted(String),
}

/// Every sample that failed during [`SampleLoader::load_all`].
#[derive(Debug, thiserror::Error)]
#[error("{} of {total} samples failed to load", .failures.len())]
pub struct LoadError {
    pub failures: Vec<SampleError>,
    pub total: usize,
}

/// Turns a fetched payload into audio.
pub trait Decode: Send + Sync + 'static {
    /// Decodes the payload fetched from the locator. `Ok(None)` means the payload held no audio.
    fn decode(&self, locator: &str, payload: Arc<[u8]>)
        -> Result<Option<DecodedBuffer>, DecodeError>;
}

/// Decodes with symphonia, optionally transcoding to the output sample rate.
pub struct SymphoniaDecoder {
    target_sample_rate: Option<u32>,
}

impl SymphoniaDecoder {
    /// Creates a decoder. Buffers are transcoded to the target rate if one is given.
    pub fn new(target_sample_rate: Option<u32>) -> SymphoniaDecoder {
        SymphoniaDecoder { target_sample_rate }
    }
}

impl Decode for SymphoniaDecoder {
    fn decode(
        &self,
        locator: &str,
        payload: Arc<[u8]>,
    ) -> Result<Option<DecodedBuffer>, DecodeError> {
        let path = locator.split(['?', '#']).next().unwrap_or_default();
        let extension = Path::new(path).extension().and_then(|ext| ext.to_str());
        let buffer = decode_audio_data(payload, extension)?;
        Ok(match (buffer, self.target_sample_rate) {
            (Some(buffer), Some(rate)) => Some(buffer.resampled(rate)),
            (buffer, _) => buffer,
        })
    }
}

type OnComplete = Box<dyn FnOnce(Vec<DecodedBuffer>) + Send>;

/// Shared between the per-sample tasks of one load.
struct LoadState {
    slots: Vec<Option<DecodedBuffer>>,
    loaded: usize,
    on_complete: Option<OnComplete>,
}

impl LoadState {
    /// Records a decoded sample. Returns the callback and the full list if this was the last.
    fn complete(
        &mut self,
        index: usize,
        buffer: DecodedBuffer,
    ) -> Option<(OnComplete, Vec<DecodedBuffer>)> {
        self.slots[index] = Some(buffer);
        self.loaded += 1;
        if self.loaded != self.slots.len() {
            return None;
        }

        let on_complete = self.on_complete.take()?;
        let buffers = std::mem::take(&mut self.slots)
            .into_iter()
            .flatten()
            .collect();
        Some((on_complete, buffers))
    }
}

/// Loads the samples for the xylophone's notes.
pub struct SampleLoader<N: Network, D: Decode> {
    network: Arc<N>,
    decoder: Arc<D>,
    origin: Origin,
}

impl<N: Network, D: Decode> SampleLoader<N, D> {
    /// Creates a loader. Relative locators are resolved against the origin.
    pub fn new(network: Arc<N>, decoder: Arc<D>, origin: Origin) -> SampleLoader<N, D> {
        SampleLoader {
            network,
            decoder,
            origin,
        }
    }

    /// Starts loading every locator in parallel. `on_complete` is called once, with the
    /// buffers in locator order, after the last one decodes. If any sample fails it is
    /// never called. Returns the handles of the per-sample tasks.
    pub fn load<F>(&self, locators: &[String], on_complete: F) -> Vec<JoinHandle<()>>
    where
        F: FnOnce(Vec<DecodedBuffer>) + Send + 'static,
    {
        info!(samples = locators.len(), "Loading samples");
        let state = Arc::new(Mutex::new(LoadState {
            slots: vec![None; locators.len()],
            loaded: 0,
            on_complete: Some(Box::new(on_complete)),
        }));

        locators
            .iter()
            .enumerate()
            .map(|(index, locator)| {
                let state = state.clone();
                let task = self.load_one(locator);
                let locator = locator.clone();
                tokio::spawn(async move {
                    match task.await {
                        Ok(buffer) => {
                            let finished = state.lock().complete(index, buffer);
                            if let Some((on_complete, buffers)) = finished {
                                info!(samples = buffers.len(), "All samples loaded");
                                on_complete(buffers);
                            }
                        }
                        Err(e) => error!(locator, err = %e, "Unable to load sample"),
                    }
                })
            })
            .collect()
    }

    /// Loads every locator in parallel and resolves with the full session, or with every
    /// failure once all samples have settled.
    pub async fn load_all(&self, locators: &[String]) -> Result<SampleSession, LoadError> {
        info!(samples = locators.len(), "Loading samples");
        let handles: Vec<JoinHandle<Result<DecodedBuffer, SampleError>>> = locators
            .iter()
            .map(|locator| tokio::spawn(self.load_one(locator)))
            .collect();

        let mut buffers = Vec::with_capacity(locators.len());
        let mut failures = Vec::new();
        for (locator, result) in locators.iter().zip(join_all(handles).await) {
            match result {
                Ok(Ok(buffer)) => buffers.push(buffer),
                Ok(Err(e)) => {
                    error!(locator, err = %e, "Unable to load sample");
                    failures.push(e);
                }
                Err(_) => failures.push(SampleError::Aborted(locator.clone())),
            }
        }

        if !failures.is_empty() {
            return Err(LoadError {
                failures,
                total: locators.len(),
            });
        }

        let session = SampleSession::new(buffers);
        info!(
            samples = session.len(),
            bytes = session.memory_size(),
            "All samples loaded"
        );
        Ok(session)
    }

    /// Returns a task that fetches and decodes one locator.
    fn load_one(
        &self,
        locator: &str,
    ) -> impl std::future::Future<Output = Result<DecodedBuffer, SampleError>> + Send + 'static
    {
        let network = self.network.clone();
        let decoder = self.decoder.clone();
        let request = Request::resolve(&self.origin, locator);
        let locator = locator.to_string();

        async move {
            let response =
                network
                    .fetch(&request)
                    .await
                    .map_err(|source| SampleError::Transport {
                        locator: locator.clone(),
                        source,
                    })?;
            if !response.ok() {
                debug!(
                    locator,
                    status = response.status(),
                    "Sample fetched with error status"
                );
            }

            let payload = response.shared_body();
            let decode_locator = locator.clone();
            let decoded =
                tokio::task::spawn_blocking(move || decoder.decode(&decode_locator, payload))
                    .await
                    .map_err(|_| SampleError::Aborted(locator.clone()))?;

            match decoded {
                Ok(Some(buffer)) => {
                    debug!(locator, frames = buffer.frames(), "Decoded sample");
                    Ok(buffer)
                }
                Ok(None) => Err(SampleError::NoBuffer(locator)),
                Err(source) => Err(SampleError::Decode { locator, source }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cache::mock::MockNetwork;
    use crate::cache::Response;
    use crate::test::short_ramp_wav;

    /// Decodes one-byte payloads into a one-sample buffer holding that byte. Lower bytes
    /// take longer, so samples finish in reverse order.
    struct TagDecoder;

    impl Decode for TagDecoder {
        fn decode(
            &self,
            _locator: &str,
            payload: Arc<[u8]>,
        ) -> Result<Option<DecodedBuffer>, DecodeError> {
            match payload.first() {
                None => Ok(None),
                Some(b'x') => Err(DecodeError::Unsupported("bad payload".to_string())),
                Some(tag) => {
                    std::thread::sleep(Duration::from_millis(5 * (10 - *tag as u64 % 10)));
                    Ok(Some(DecodedBuffer::new(vec![*tag as f32], 1, 44100)))
                }
            }
        }
    }

    fn locators(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("./note/{}.mp3", i)).collect()
    }

    fn tagged_network(count: usize) -> Arc<MockNetwork> {
        let network = Arc::new(MockNetwork::new());
        for i in 1..=count {
            network.serve(&format!("http://localhost/note/{}.mp3", i), &[i as u8]);
        }
        network
    }

    fn tag_loader(network: Arc<MockNetwork>) -> SampleLoader<MockNetwork, TagDecoder> {
        SampleLoader::new(
            network,
            Arc::new(TagDecoder),
            Origin::new("http://localhost"),
        )
    }

    fn tags(buffers: &[DecodedBuffer]) -> Vec<f32> {
        buffers.iter().map(|buffer| buffer.data()[0]).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_load_completes_once_in_locator_order() {
        let loader = tag_loader(tagged_network(8));
        let calls = Arc::new(AtomicUsize::new(0));
        let loaded = Arc::new(Mutex::new(Vec::new()));

        let handles = {
            let calls = calls.clone();
            let loaded = loaded.clone();
            loader.load(&locators(8), move |buffers| {
                calls.fetch_add(1, Ordering::SeqCst);
                *loaded.lock() = buffers;
            })
        };
        for handle in join_all(handles).await {
            handle.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            tags(&loaded.lock()),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
        );
    }

    #[tokio::test]
    async fn test_load_never_completes_on_failure() {
        let network = tagged_network(3);
        network.serve("http://localhost/note/2.mp3", b"x");
        let loader = tag_loader(network.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles = {
            let calls = calls.clone();
            loader.load(&locators(3), move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        join_all(handles).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Transport failures stall completion the same way.
        let handles = {
            let calls = calls.clone();
            loader.load(&locators(4), move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        join_all(handles).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(network.calls(), 7);

        // So does a payload that decodes to no audio.
        network.serve("http://localhost/note/2.mp3", &[2]);
        network.serve("http://localhost/note/3.mp3", b"");
        let handles = {
            let calls = calls.clone();
            loader.load(&locators(3), move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        join_all(handles).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(network.calls(), 10);
    }

    #[tokio::test]
    async fn test_load_empty_never_completes() {
        let loader = tag_loader(tagged_network(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let handles = {
            let calls = calls.clone();
            loader.load(&[], move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(handles.is_empty());
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_all_reports_failures() {
        let network = tagged_network(4);
        network.serve("http://localhost/note/2.mp3", b"x");
        network.respond(
            "http://localhost/note/3.mp3",
            Response::new(404, Vec::<u8>::new()),
        );
        let loader = tag_loader(network);

        let err = loader.load_all(&locators(5)).await.unwrap_err();
        assert_eq!(err.total, 5);
        assert_eq!(err.failures.len(), 3);
        assert!(matches!(err.failures[0], SampleError::Decode { .. }));
        assert!(matches!(err.failures[1], SampleError::NoBuffer(_)));
        assert!(matches!(err.failures[2], SampleError::Transport { .. }));
        assert_eq!(err.to_string(), "3 of 5 samples failed to load");
    }

    #[tokio::test]
    async fn test_load_all_decodes_and_transcodes() {
        let network = Arc::new(MockNetwork::new());
        network.serve("http://localhost/note/1.wav", &short_ramp_wav(22050));
        network.serve("http://localhost/note/2.wav", &short_ramp_wav(44100));
        let loader = SampleLoader::new(
            network,
            Arc::new(SymphoniaDecoder::new(Some(44100))),
            Origin::new("http://localhost/"),
        );

        let session = loader
            .load_all(&["./note/1.wav".to_string(), "./note/2.wav".to_string()])
            .await
            .unwrap();
        assert_eq!(session.len(), 2);
        for buffer in session.buffers() {
            assert_eq!(buffer.sample_rate(), 44100);
            assert_eq!(buffer.channel_count(), 1);
        }
        assert!(session.get(0).unwrap().frames() > session.get(1).unwrap().frames());
    }
}
