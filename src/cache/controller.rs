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

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::network::{FetchError, Network};
use super::request::{Origin, Request, Response};
use super::storage::{CacheError, CacheStorage, CacheStore};

/// The suffix shared by every static asset store.
pub const STATIC_SUFFIX: &str = "static";

/// Returns the store name for the namespace and version.
pub fn cache_name(namespace: &str, version: &str) -> String {
    format!("{}-{}-{}", namespace, version, STATIC_SUFFIX)
}

/// Returns the stores that belong to the namespace but aren't the current store.
pub fn stale_stores(keys: &[String], namespace: &str, current: &str) -> Vec<String> {
    keys.iter()
        .filter(|key| key.starts_with(namespace) && key.as_str() != current)
        .cloned()
        .collect()
}

/// Where the controller is in its install/activate lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install or activation failed. The controller never takes control.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        write!(f, "{}", state)
    }
}

/// The outcome of intercepting a request.
#[derive(Debug, PartialEq, Eq)]
pub enum Interception {
    /// The controller doesn't handle the request. It goes to the network untouched.
    Passthrough,
    /// The controller answers the request. `None` is the empty response.
    Respond(Option<Response>),
}

/// The result of a cache-first lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Cached(Response),
    /// Served by the network. `stash` is the copy to write back to the store.
    Network {
        response: Response,
        stash: Response,
    },
    /// Neither the cache nor the network could answer.
    Unavailable,
}

/// Answers from the cache if `lookup` finds the request, otherwise from `network`.
/// Network failures resolve to `Unavailable` rather than an error.
pub async fn cache_first<L, LF, F, NF>(request: &Request, lookup: L, network: F) -> Resolution
where
    L: FnOnce() -> LF,
    LF: Future<Output = Option<Response>>,
    F: FnOnce() -> NF,
    NF: Future<Output = Result<Response, FetchError>>,
{
    if let Some(response) = lookup().await {
        debug!(url = request.url(), "Cache hit");
        return Resolution::Cached(response);
    }

    match network().await {
        Ok(response) => {
            debug!(url = request.url(), status = response.status(), "Cache miss");
            let stash = response.clone();
            Resolution::Network { response, stash }
        }
        Err(e) => {
            debug!(url = request.url(), err = %e, "Network unavailable");
            Resolution::Unavailable
        }
    }
}

/// Keeps a versioned store of the application's assets and answers same-origin
/// requests from it.
pub struct CacheController<S: CacheStorage, N: Network> {
    origin: Origin,
    namespace: String,
    cache_name: String,
    assets: Vec<String>,
    storage: Arc<S>,
    network: Arc<N>,
    state: Mutex<LifecycleState>,
    controls_clients: AtomicBool,
}

impl<S: CacheStorage, N: Network> CacheController<S, N> {
    /// Creates a new controller. Nothing is fetched until install.
    pub fn new(
        origin: Origin,
        namespace: &str,
        version: &str,
        assets: Vec<String>,
        storage: Arc<S>,
        network: Arc<N>,
    ) -> CacheController<S, N> {
        CacheController {
            origin,
            namespace: namespace.to_string(),
            cache_name: cache_name(namespace, version),
            assets,
            storage,
            network,
            state: Mutex::new(LifecycleState::Parsed),
            controls_clients: AtomicBool::new(false),
        }
    }

    /// Returns the name of the current store.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Returns the origin this controller serves.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Returns true once activation has claimed clients.
    pub fn controls_clients(&self) -> bool {
        self.controls_clients.load(Ordering::Acquire)
    }

    /// Returns the underlying storage.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    fn set_state(&self, state: LifecycleState) {
        debug!(cache = self.cache_name, state = %state, "Lifecycle transition");
        *self.state.lock() = state;
    }

    /// Populates the current store with every asset. Either every asset is stored or none
    /// is. On success the controller is immediately ready to activate.
    pub async fn install(&self) -> Result<(), CacheError> {
        self.set_state(LifecycleState::Installing);
        match self.add_all().await {
            Ok(()) => {
                info!(
                    cache = self.cache_name,
                    assets = self.assets.len(),
                    "Installed assets"
                );
                self.set_state(LifecycleState::Installed);
                Ok(())
            }
            Err(e) => {
                error!(cache = self.cache_name, err = %e, "Install failed");
                self.set_state(LifecycleState::Redundant);
                Err(e)
            }
        }
    }

    async fn add_all(&self) -> Result<(), CacheError> {
        let store = self.storage.open(&self.cache_name).await?;
        let requests: Vec<Request> = self
            .assets
            .iter()
            .map(|asset| Request::resolve(&self.origin, asset))
            .collect();

        let responses = join_all(requests.iter().map(|request| self.network.fetch(request))).await;

        let mut entries = Vec::with_capacity(requests.len());
        for (request, response) in requests.into_iter().zip(responses) {
            let response = response.map_err(|e| CacheError::Add {
                url: request.url(),
                reason: e.to_string(),
            })?;
            if !response.ok() {
                return Err(CacheError::Add {
                    url: request.url(),
                    reason: format!("status {}", response.status()),
                });
            }
            entries.push((request, response));
        }

        store.put_all(entries).await
    }

    /// Deletes every stale store in the namespace and takes control of requests.
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        if self.state() != LifecycleState::Installed {
            return Err(CacheError::NotInstalled(self.cache_name.clone()));
        }

        self.set_state(LifecycleState::Activating);
        let keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                self.set_state(LifecycleState::Redundant);
                return Err(e);
            }
        };

        let stale = stale_stores(&keys, &self.namespace, &self.cache_name);
        if let Err(e) = try_join_all(stale.iter().map(|name| self.storage.delete(name))).await {
            self.set_state(LifecycleState::Redundant);
            return Err(e);
        }
        for name in stale.iter() {
            info!(cache = name, "Deleted stale cache");
        }

        self.set_state(LifecycleState::Activated);
        self.controls_clients.store(true, Ordering::Release);
        Ok(stale)
    }

    /// Runs install then activate. Returns the deleted stale stores. On failure the
    /// controller never takes control, so requests made through it go to the network.
    pub async fn install_and_activate(&self) -> Result<Vec<String>, CacheError> {
        self.install().await?;
        self.activate().await
    }

    /// Decides how to answer a request. Cross-origin requests pass through; same-origin
    /// requests are served cache-first and network responses are written back.
    pub async fn intercept(&self, request: &Request) -> Interception {
        if request.origin() != &self.origin {
            debug!(url = request.url(), "Passing through cross-origin request");
            return Interception::Passthrough;
        }

        let resolution = cache_first(
            request,
            || self.lookup(request),
            || self.network.fetch(request),
        )
        .await;

        match resolution {
            Resolution::Cached(response) => Interception::Respond(Some(response)),
            Resolution::Network { response, stash } => {
                self.stash(request.clone(), stash);
                Interception::Respond(Some(response))
            }
            Resolution::Unavailable => Interception::Respond(None),
        }
    }

    /// Looks the request up in the current store. Storage errors count as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        let found = match self.storage.open(&self.cache_name).await {
            Ok(store) => store.match_request(request).await,
            Err(e) => Err(e),
        };
        match found {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    cache = self.cache_name,
                    url = request.url(),
                    err = %e,
                    "Cache lookup failed"
                );
                None
            }
        }
    }

    /// Writes the response to the current store in the background.
    fn stash(&self, request: Request, response: Response) {
        let storage = self.storage.clone();
        let name = self.cache_name.clone();
        tokio::spawn(async move {
            let result: Result<(), CacheError> = async {
                let store = storage.open(&name).await?;
                store.put(&request, response).await
            }
            .await;
            if let Err(e) = result {
                warn!(cache = name, url = request.url(), err = %e, "Unable to stash response");
            }
        });
    }
}

/// Requests made through the controller see what a controlled page would see.
impl<S: CacheStorage, N: Network> Network for CacheController<S, N> {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if !self.controls_clients() {
            return self.network.fetch(request).await;
        }

        match self.intercept(request).await {
            Interception::Passthrough => self.network.fetch(request).await,
            Interception::Respond(Some(response)) => Ok(response),
            Interception::Respond(None) => Err(FetchError::EmptyResponse(request.url())),
        }
    }
}
