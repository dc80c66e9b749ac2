use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Which key-value backend holds the persisted cart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sled(PathBuf), // database directory
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub store_timeout: Option<Duration>, // None = wait on the store forever
    pub write_attempts: u32,             // >= 1
    pub event_capacity: usize,           // broadcast channel buffer
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: None,
            write_attempts: Config::DEFAULT_WRITE_ATTEMPTS,
            event_capacity: Config::DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub data_dir: String,
    pub store: StoreConfig,
    pub engine: EngineConfig,
}

impl Config {
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_WRITE_ATTEMPTS: u32 = 3;
    const DEFAULT_EVENT_CAPACITY: usize = 64;
    const SLED_FILE: &str = "cart.sled";

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir =
            lookup("CART_DATA_DIR").unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string());

        let backend = match lookup("CART_STORE_BACKEND").as_deref().map(str::trim) {
            Some("memory") => StoreBackend::Memory,
            None | Some("sled") => StoreBackend::Sled(PathBuf::from(&data_dir).join(Self::SLED_FILE)),
            Some(other) => {
                warn!("Unknown CART_STORE_BACKEND '{}', falling back to sled", other);
                StoreBackend::Sled(PathBuf::from(&data_dir).join(Self::SLED_FILE))
            }
        };

        let store_timeout = parse_var::<u64, _>(&lookup, "CART_STORE_TIMEOUT_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let write_attempts = parse_var(&lookup, "CART_WRITE_ATTEMPTS")
            .unwrap_or(Self::DEFAULT_WRITE_ATTEMPTS)
            .max(1);

        let event_capacity = parse_var(&lookup, "CART_EVENT_CAPACITY")
            .unwrap_or(Self::DEFAULT_EVENT_CAPACITY)
            .max(1);

        Self {
            data_dir,
            store: StoreConfig { backend },
            engine: EngineConfig {
                store_timeout,
                write_attempts,
                event_capacity,
            },
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}='{}', using default", name, raw);
            None
        }
    }
}

impl StoreBackend {
    pub fn name(&self) -> &str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sled(_) => "sled",
        }
    }
}
