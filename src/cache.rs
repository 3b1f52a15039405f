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

//! Offline asset cache.
//!
//! A versioned store is populated on install and pruned of stale versions on activate.
//! After that, same-origin requests are answered cache-first and fall back to the network.

mod controller;
mod network;
mod request;
mod storage;

pub use controller::{
    cache_first, cache_name, stale_stores, CacheController, Interception, LifecycleState,
    Resolution,
};
pub use network::{FetchError, FileOrigin, Network};
#[cfg(test)]
pub(crate) use network::mock;
pub use request::{Origin, Request, Response};
pub use storage::{
    CacheError, CacheStorage, CacheStore, DiskCacheStorage, DiskStore, MemoryCacheStorage,
    MemoryStore,
};
