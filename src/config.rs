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

pub mod audio;
pub mod cache;
pub mod error;
pub mod xylophone;

pub use self::audio::Audio;
pub use self::cache::Cache;
pub use self::error::ConfigError;
pub use self::xylophone::{InputSetting, Layout, Xylophone};

/// The note samples the instrument ships with, in bar order.
pub const DEFAULT_SAMPLES: [&str; 8] = [
    "./note/1.mp3",
    "./note/2.mp3",
    "./note/3.mp3",
    "./note/4.mp3",
    "./note/5.mp3",
    "./note/6.mp3",
    "./note/7.mp3",
    "./note/8.mp3",
];
