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

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::request::{Origin, Request, Response};

/// The index file served for directory paths such as `/`.
const INDEX_FILE: &str = "index.html";

/// Transport-level fetch failures. An HTTP error status is a response, not a failure.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("no response for {0}")]
    EmptyResponse(String),
}

/// Something that can answer asset requests.
pub trait Network: Send + Sync + 'static {
    /// Fetches the request. Resolves to a response for any status, or a transport failure.
    fn fetch(&self, request: &Request)
        -> impl Future<Output = Result<Response, FetchError>> + Send;
}

/// Serves one origin from a directory on disk. Requests for other origins fail as
/// unreachable; missing files are 404 responses.
pub struct FileOrigin {
    origin: Origin,
    root: PathBuf,
}

impl FileOrigin {
    /// Creates a file origin rooted at the given directory.
    pub fn new(origin: Origin, root: &Path) -> FileOrigin {
        FileOrigin {
            origin,
            root: root.to_path_buf(),
        }
    }

    /// Returns the origin this serves.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Maps a request path onto the root directory.
    fn file_path(&self, request: &Request) -> PathBuf {
        let relative = request.path().trim_start_matches('/');
        let mut path = self.root.join(relative);
        if relative.is_empty() || relative.ends_with('/') {
            path.push(INDEX_FILE);
        }
        path
    }
}

impl Network for FileOrigin {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if request.origin() != &self.origin {
            return Err(FetchError::Network {
                url: request.url(),
                reason: format!("origin {} is unreachable", request.origin()),
            });
        }

        let path = self.file_path(request);
        match tokio::fs::read(&path).await {
            Ok(body) => {
                debug!(url = request.url(), bytes = body.len(), "Served asset");
                Ok(Response::new(200, body))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(url = request.url(), path = ?path, "Asset not found");
                Ok(Response::new(404, Vec::<u8>::new()))
            }
            Err(e) => Err(FetchError::Network {
                url: request.url(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// An in-memory network that counts fetches. Unknown URLs are transport failures.
    #[derive(Default)]
    pub struct MockNetwork {
        responses: Mutex<HashMap<String, Response>>,
        calls: AtomicUsize,
    }

    impl MockNetwork {
        pub fn new() -> MockNetwork {
            MockNetwork::default()
        }

        /// Serves the body at the URL with a 200 status.
        pub fn serve(&self, url: &str, body: &[u8]) {
            self.respond(url, Response::new(200, body.to_vec()));
        }

        /// Serves the response at the URL.
        pub fn respond(&self, url: &str, response: Response) {
            self.responses.lock().insert(url.to_string(), response);
        }

        /// Returns the number of fetches made so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Network for MockNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Let other fetches interleave.
            tokio::task::yield_now().await;
            self.responses
                .lock()
                .get(&request.url())
                .cloned()
                .ok_or_else(|| FetchError::Network {
                    url: request.url(),
                    reason: "connection refused".to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_origin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("note")).unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html>").unwrap();
        std::fs::write(dir.path().join("note/1.mp3"), b"mp3").unwrap();

        let origin = Origin::new("http://localhost");
        let network = FileOrigin::new(origin.clone(), dir.path());

        let shell = network.fetch(&Request::resolve(&origin, "./")).await.unwrap();
        assert_eq!(shell.status(), 200);
        assert_eq!(shell.body(), b"<html>");

        let note = network
            .fetch(&Request::resolve(&origin, "./note/1.mp3"))
            .await
            .unwrap();
        assert_eq!(note.body(), b"mp3");

        let missing = network
            .fetch(&Request::resolve(&origin, "./note/9.mp3"))
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let foreign = network
            .fetch(&Request::resolve(&origin, "https://cdn.example.com/x.js"))
            .await;
        assert!(matches!(foreign, Err(FetchError::Network { .. })));
    }
}
