use async_trait::async_trait;
use log::{info, warn};
use model::metadata::ContentAddress;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{ContentStore, IpfsError};

const PIN_JSON_PATH: &str = "pinning/pinJSONToIPFS";

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash", alias = "ipfsHash", alias = "Hash")]
    ipfs_hash: Option<String>,
}

/// Pins through the credential-injecting proxy and resolves through a public gateway.
#[derive(Clone)]
pub struct PinningClient {
    client: Client,
    proxy: Url,
    gateway: Url,
}

impl PinningClient {
    pub fn new(proxy: &str, gateway: &str) -> Result<PinningClient, IpfsError> {
        Ok(PinningClient {
            client: Client::new(),
            proxy: base_url(proxy)?,
            gateway: base_url(gateway)?,
        })
    }

    fn pin_endpoint(&self) -> Result<Url, IpfsError> {
        Ok(self.proxy.join(PIN_JSON_PATH)?)
    }

    fn locate(&self, address: &ContentAddress) -> Result<Url, IpfsError> {
        match address {
            ContentAddress::Ipfs(cid) => Ok(self.gateway.join(cid)?),
            ContentAddress::Http(url) => Ok(Url::parse(url)?),
        }
    }
}

/// `join` replaces the last path segment unless the base ends with a slash.
fn base_url(raw: &str) -> Result<Url, IpfsError> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}

#[async_trait]
impl ContentStore for PinningClient {
    async fn pin(&self, document: &Value) -> Result<ContentAddress, IpfsError> {
        let endpoint = self.pin_endpoint()?;
        let response = self.client.post(endpoint).json(document).send().await?;
        if !response.status().is_success() {
            warn!("Pinning failed: {}", response.status());
            return Err(IpfsError::Status {
                status: response.status().as_u16(),
                what: "pin".to_owned(),
            });
        }
        let body: PinResponse = response.json().await?;
        let cid = body
            .ipfs_hash
            .filter(|cid| !cid.is_empty())
            .ok_or(IpfsError::MissingHash)?;
        info!("Pinned document as {}", cid);
        Ok(ContentAddress::Ipfs(cid))
    }

    async fn resolve(&self, address: &ContentAddress) -> Result<Value, IpfsError> {
        let url = self.locate(address)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IpfsError::NotFound(address.clone()));
        }
        if !status.is_success() {
            return Err(IpfsError::Status {
                status: status.as_u16(),
                what: address.to_string(),
            });
        }
        Ok(response.json().await?)
    }
}
