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
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use xylophone::audio;
use xylophone::cache::{
    CacheController, CacheStorage, DiskCacheStorage, FileOrigin, MemoryCacheStorage, Origin,
};
use xylophone::config;
use xylophone::controller::{keyboard, Controller};
use xylophone::instrument::Xylophone;
use xylophone::samples::{NotePlayer, SampleLoader, SampleSession, SymphoniaDecoder};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A virtual xylophone."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads and verifies every configured sample.
    Samples {
        /// The path to the xylophone config.
        config_path: String,
    },
    /// Installs and activates the offline cache, then lists the caches.
    Cache {
        /// The path to the xylophone config.
        config_path: String,
    },
    /// Start will start the xylophone.
    Start {
        /// The path to the xylophone config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Samples { config_path } => {
            let (config, base) = load_config(&config_path)?;
            let origin = Origin::new(config.origin());
            let network = FileOrigin::new(origin.clone(), &config.assets_path(&base));
            let decoder = SymphoniaDecoder::new(config.audio().sample_rate());
            let loader = SampleLoader::new(Arc::new(network), Arc::new(decoder), origin);

            let samples = config.samples();
            let session = loader.load_all(&samples).await?;

            println!("Samples (count: {}):", session.len());
            for (locator, buffer) in samples.iter().zip(session.buffers()) {
                println!(
                    "- {} ({} channels, {} Hz, {:.2}s)",
                    locator,
                    buffer.channel_count(),
                    buffer.sample_rate(),
                    buffer.duration().as_secs_f64()
                );
            }
            println!("\nDecoded size: {} bytes", session.memory_size());
        }
        Commands::Cache { config_path } => {
            let (config, base) = load_config(&config_path)?;
            match cache_dir(&config, &base) {
                Some(dir) => cache(&config, &base, DiskCacheStorage::new(&dir)).await?,
                None => cache(&config, &base, MemoryCacheStorage::new()).await?,
            }
        }
        Commands::Start { config_path } => {
            let (config, base) = load_config(&config_path)?;
            match cache_dir(&config, &base) {
                Some(dir) => start(&config, &base, DiskCacheStorage::new(&dir)).await?,
                None => start(&config, &base, MemoryCacheStorage::new()).await?,
            }
        }
    }

    Ok(())
}

/// Parses the config. Returns it with the directory relative paths are resolved against.
fn load_config(path: &str) -> Result<(config::Xylophone, PathBuf), Box<dyn Error>> {
    let path = PathBuf::from(path);
    let config = config::Xylophone::deserialize(&path)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((config, base))
}

fn cache_dir(config: &config::Xylophone, base: &Path) -> Option<PathBuf> {
    config.cache().dir().map(|dir| base.join(dir))
}

fn cache_controller<S: CacheStorage>(
    config: &config::Xylophone,
    base: &Path,
    storage: S,
) -> Arc<CacheController<S, FileOrigin>> {
    let origin = Origin::new(config.origin());
    let network = FileOrigin::new(origin.clone(), &config.assets_path(base));
    let assets = config.cache().assets(&config.samples());
    Arc::new(CacheController::new(
        origin,
        config.cache().namespace(),
        config.cache().version(),
        assets,
        Arc::new(storage),
        Arc::new(network),
    ))
}

async fn cache<S: CacheStorage>(
    config: &config::Xylophone,
    base: &Path,
    storage: S,
) -> Result<(), Box<dyn Error>> {
    let controller = cache_controller(config, base, storage);
    for name in controller.install_and_activate().await? {
        println!("Deleted stale cache {}", name);
    }

    println!("Caches:");
    for name in controller.storage().keys().await? {
        if name == controller.cache_name() {
            println!("- {} (current)", name);
        } else {
            println!("- {}", name);
        }
    }
    Ok(())
}

async fn start<S: CacheStorage>(
    config: &config::Xylophone,
    base: &Path,
    storage: S,
) -> Result<(), Box<dyn Error>> {
    let controller = cache_controller(config, base, storage);
    // The instrument works without the cache; sample requests then go straight to the network.
    if let Err(e) = controller.install_and_activate().await {
        error!(cache = controller.cache_name(), err = %e, "Offline cache unavailable");
    }

    let device = audio::get_device(config.audio())?;
    let samples = config.samples();
    let xylophone = Arc::new(Xylophone::new(
        samples.len(),
        config.layout(),
        config.input().modality(),
        NotePlayer::new(device.clone()),
    ));

    // Sample requests go through the cache controller like any controlled page's would.
    let decoder = SymphoniaDecoder::new(Some(device.sample_rate()));
    let loader = SampleLoader::new(controller, Arc::new(decoder), Origin::new(config.origin()));
    {
        let xylophone = xylophone.clone();
        loader.load(&samples, move |buffers| {
            xylophone.attach_session(SampleSession::new(buffers))
        });
    }

    info!(device = %device, notes = samples.len(), "Xylophone started");
    let driver = Arc::new(keyboard::Driver::new(xylophone.modality()));
    Controller::new(xylophone, driver)?.join().await?;
    Ok(())
}
