use std::{
    env::{var, VarError},
    fmt::Display,
    str::FromStr,
    sync::Arc,
};

use dotenv::dotenv;
use eyre::{eyre, Context, Error};
use log::debug;

const DEFAULT_PINNING_PROXY_URL: &str = "http://localhost:3001/pinata";
const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 15;
const DEFAULT_CATALOG_CONCURRENCY: usize = 4;
const DEFAULT_RENT_WINDOW_SECS: u64 = 3600;

#[derive(Clone)]
pub struct Env(Arc<EnvInner>);

#[derive(Clone)]
pub struct EnvInner {
    mongo_url: String,
    rust_log: String,
    pinning_proxy_url: String,
    ipfs_gateway: String,
    registry_secret: Option<String>,
    reconcile_interval_secs: u64,
    catalog_concurrency: usize,
    rent_window_secs: u64,
}

impl Env {
    pub fn mongo_url(&self) -> &str {
        &self.0.mongo_url
    }

    pub fn rust_log(&self) -> &str {
        &self.0.rust_log
    }

    pub fn pinning_proxy_url(&self) -> &str {
        &self.0.pinning_proxy_url
    }

    pub fn ipfs_gateway(&self) -> &str {
        &self.0.ipfs_gateway
    }

    pub fn registry_secret(&self) -> Option<&str> {
        self.0.registry_secret.as_deref()
    }

    pub fn reconcile_interval_secs(&self) -> u64 {
        self.0.reconcile_interval_secs
    }

    pub fn catalog_concurrency(&self) -> usize {
        self.0.catalog_concurrency
    }

    pub fn rent_window_secs(&self) -> u64 {
        self.0.rent_window_secs
    }

    pub fn load() -> Result<Env, Error> {
        if dotenv().is_err() {
            debug!("No .env file, using the process environment");
        }

        Ok(Env(Arc::new(EnvInner {
            mongo_url: var("MONGO_URL").context("MONGO_URL is not set")?,
            rust_log: optional("RUST_LOG")?.unwrap_or_else(|| "info".to_owned()),
            pinning_proxy_url: optional("PINNING_PROXY_URL")?
                .unwrap_or_else(|| DEFAULT_PINNING_PROXY_URL.to_owned()),
            ipfs_gateway: optional("IPFS_GATEWAY")?
                .unwrap_or_else(|| DEFAULT_IPFS_GATEWAY.to_owned()),
            registry_secret: optional("REGISTRY_SECRET")?,
            reconcile_interval_secs: parsed(
                "RECONCILE_INTERVAL_SECS",
                DEFAULT_RECONCILE_INTERVAL_SECS,
            )?,
            catalog_concurrency: parsed("CATALOG_CONCURRENCY", DEFAULT_CATALOG_CONCURRENCY)?,
            rent_window_secs: parsed("RENT_WINDOW_SECS", DEFAULT_RENT_WINDOW_SECS)?,
        })))
    }
}

fn optional(name: &str) -> Result<Option<String>, Error> {
    match var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("{} is not valid unicode", name)),
    }
}

fn parsed<T>(name: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(name)? {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err| eyre!("{} is invalid: {}", name, err)),
        None => Ok(default),
    }
}
