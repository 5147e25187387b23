use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::{EncryptionEngine, EngineConnector, EngineError};
use crate::address::Address;
use crate::config::EngineConfig;

const MODULE_PATH: &str = "v1/module";
const KEYSET_PATH: &str = "v1/keyset";
const INSTANCES_PATH: &str = "v1/instances";

#[derive(Debug, Serialize)]
struct CreateInstanceParams {
    contract: Address,
}

#[derive(Debug, Deserialize)]
struct CreateInstanceResponse {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
struct KeysetResponse {
    keyset_id: String,
}

#[derive(Debug, Serialize)]
struct EncryptParams {
    contract: Address,
    user: Address,
    bits: u8,
    value: u32,
}

#[derive(Debug, Deserialize)]
struct EncryptResponse {
    handles: Vec<String>,
}

/// Staged connector against the hosted FHE relayer service.
///
/// The three [`EngineConnector`] stages map to the relayer's module probe,
/// keyset fetch, and contract-bound instance registration. HTTP-level
/// timeouts are enforced by [`super::EngineHandle`] per stage.
pub struct RelayerConnector {
    client: Client,
    base: Url,
}

impl RelayerConnector {
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let base = normalize_endpoint(&config.relayer_endpoint)?;
        let client = Client::builder()
            .build()
            .context("build relayer HTTP client")?;
        Ok(Self { client, base })
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("compose relayer URL for {path}"))
    }
}

#[async_trait]
impl EngineConnector for RelayerConnector {
    async fn load_module(&self) -> anyhow::Result<()> {
        let response = self
            .client
            .get(self.url(MODULE_PATH)?)
            .send()
            .await
            .context("fetch relayer module descriptor")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "relayer module probe returned HTTP status {}",
                response.status()
            ));
        }
        Ok(())
    }

    async fn init_module(&self) -> anyhow::Result<()> {
        let response = self
            .client
            .get(self.url(KEYSET_PATH)?)
            .send()
            .await
            .context("fetch relayer keyset")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "relayer keyset fetch returned HTTP status {}",
                response.status()
            ));
        }
        let keyset: KeysetResponse = response.json().await.context("decode relayer keyset")?;
        if keyset.keyset_id.is_empty() {
            return Err(anyhow!("relayer returned an empty keyset id"));
        }
        Ok(())
    }

    async fn create_instance(
        &self,
        contract: Address,
    ) -> anyhow::Result<Arc<dyn EncryptionEngine>> {
        let response = self
            .client
            .post(self.url(INSTANCES_PATH)?)
            .json(&CreateInstanceParams { contract })
            .send()
            .await
            .context("register relayer instance")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "relayer instance registration returned HTTP status {}",
                response.status()
            ));
        }
        let created: CreateInstanceResponse = response
            .json()
            .await
            .context("decode relayer instance registration")?;
        let encrypt_url = self.url(&format!(
            "{INSTANCES_PATH}/{}/encrypt",
            created.instance_id
        ))?;
        Ok(Arc::new(RelayerEngine {
            client: self.client.clone(),
            encrypt_url,
            contract,
        }))
    }
}

/// Engine instance bound to one contract through a registered relayer
/// instance. Values are encrypted as unsigned 32-bit integers.
pub struct RelayerEngine {
    client: Client,
    encrypt_url: Url,
    contract: Address,
}

#[async_trait]
impl EncryptionEngine for RelayerEngine {
    async fn encrypt_u32(&self, user: Address, value: u32) -> Result<Vec<u8>, EngineError> {
        let params = EncryptParams {
            contract: self.contract,
            user,
            bits: 32,
            value,
        };
        let response = self
            .client
            .post(self.encrypt_url.clone())
            .json(&params)
            .send()
            .await
            .map_err(|err| EngineError::RequestFailed {
                reason: format!("relayer transport error: {err}"),
            })?;
        if !response.status().is_success() {
            return Err(EngineError::RequestFailed {
                reason: format!("relayer returned HTTP status {}", response.status()),
            });
        }
        let payload: EncryptResponse =
            response
                .json()
                .await
                .map_err(|err| EngineError::RequestFailed {
                    reason: format!("decode relayer encrypt response: {err}"),
                })?;
        let Some(handle) = payload.handles.first() else {
            return Err(EngineError::EmptyHandles);
        };
        let digits = handle.strip_prefix("0x").unwrap_or(handle);
        hex::decode(digits).map_err(|_| EngineError::RequestFailed {
            reason: format!("relayer handle is not valid hex: {handle:?}"),
        })
    }
}

fn normalize_endpoint(endpoint: &str) -> anyhow::Result<Url> {
    let mut url: Url = endpoint
        .parse()
        .with_context(|| format!("invalid relayer endpoint {endpoint:?}"))?;
    // Url::join treats a path without a trailing slash as a file component.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
