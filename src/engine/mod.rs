//! Lazily initialized, single-flight handle to the homomorphic encryption
//! engine.
//!
//! Initialization is staged (module load, module setup, contract-bound
//! instance construction), each stage bounded by its own timeout since the
//! later stages fetch key material over the network. Concurrent callers of
//! [`EngineHandle::acquire`] converge on one in-flight initialization; a
//! failed attempt clears all cached state so the next call starts fresh.

mod relayer;

pub use relayer::{RelayerConnector, RelayerEngine};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::address::Address;
use crate::config::EngineConfig;

/// Contract-bound encryption engine instance.
///
/// One call encrypts one plaintext `u32` for the (contract, user) pair and
/// returns the raw handle bytes the chain will store. Handles are opaque:
/// nothing client-side can reverse them.
#[async_trait]
pub trait EncryptionEngine: Send + Sync {
    async fn encrypt_u32(&self, user: Address, value: u32) -> Result<Vec<u8>, EngineError>;
}

/// Staged constructor for an [`EncryptionEngine`].
///
/// The production implementation is [`RelayerConnector`]; tests substitute
/// in-memory connectors.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Load the engine module (stage 1).
    async fn load_module(&self) -> anyhow::Result<()>;
    /// Run module-level setup such as key-material fetches (stage 2).
    async fn init_module(&self) -> anyhow::Result<()>;
    /// Construct the instance bound to `contract` (stage 3).
    async fn create_instance(
        &self,
        contract: Address,
    ) -> anyhow::Result<Arc<dyn EncryptionEngine>>;
}

/// Initialization stage, reported in errors so callers see what failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitStage {
    LoadModule,
    InitModule,
    CreateInstance,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadModule => f.write_str("module load"),
            Self::InitModule => f.write_str("module setup"),
            Self::CreateInstance => f.write_str("instance creation"),
        }
    }
}

/// Engine failures. Clonable so one in-flight failure can be delivered to
/// every caller attached to it.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine {stage} timed out after {}s", .timeout.as_secs())]
    StageTimeout { stage: InitStage, timeout: Duration },
    #[error("engine {stage} failed: {reason}")]
    StageFailed { stage: InitStage, reason: String },
    #[error("encryption request timed out after {}s", .timeout.as_secs())]
    RequestTimeout { timeout: Duration },
    #[error("encryption request failed: {reason}")]
    RequestFailed { reason: String },
    #[error("encryption produced no handles")]
    EmptyHandles,
}

/// Per-stage initialization timeouts.
#[derive(Clone, Copy, Debug)]
pub struct StageTimeouts {
    pub module_load: Duration,
    pub module_init: Duration,
    pub instance: Duration,
}

impl From<&EngineConfig> for StageTimeouts {
    fn from(config: &EngineConfig) -> Self {
        Self {
            module_load: config.module_load_timeout(),
            module_init: config.module_init_timeout(),
            instance: config.instance_timeout(),
        }
    }
}

type AcquireResult = Result<Arc<dyn EncryptionEngine>, EngineError>;
type InflightFuture = Shared<BoxFuture<'static, AcquireResult>>;

#[derive(Default)]
struct HandleState {
    instance: Option<Arc<dyn EncryptionEngine>>,
    inflight: Option<InflightFuture>,
}

/// Process-wide handle owning at most one engine instance.
///
/// Construct one at application start and inject it wherever encryption is
/// needed; the contract address is fixed at construction so no global
/// mutable slot is involved.
pub struct EngineHandle {
    connector: Arc<dyn EngineConnector>,
    contract: Address,
    timeouts: StageTimeouts,
    state: Mutex<HandleState>,
}

impl EngineHandle {
    pub fn new(
        connector: Arc<dyn EngineConnector>,
        contract: Address,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            connector,
            contract,
            timeouts,
            state: Mutex::new(HandleState::default()),
        }
    }

    /// Contract address the engine binds to.
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Return the cached engine, attaching to an in-flight initialization or
    /// starting one if neither exists. Idempotent under concurrent callers.
    pub async fn acquire(&self) -> AcquireResult {
        let inflight = {
            let mut state = self.state.lock();
            if let Some(instance) = &state.instance {
                return Ok(Arc::clone(instance));
            }
            match &state.inflight {
                Some(existing) => existing.clone(),
                None => {
                    let fut = Self::initialize(
                        Arc::clone(&self.connector),
                        self.contract,
                        self.timeouts,
                    )
                    .boxed()
                    .shared();
                    state.inflight = Some(fut.clone());
                    fut
                }
            }
        };

        let result = inflight.clone().await;
        let mut state = self.state.lock();
        // A late waiter must not clobber an attempt started after its own
        // failed one, so only the still-current in-flight slot is cleared.
        if state
            .inflight
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&inflight))
        {
            state.inflight = None;
        }
        match result {
            Ok(instance) => {
                state.instance = Some(Arc::clone(&instance));
                Ok(instance)
            }
            Err(err) => Err(err),
        }
    }

    async fn initialize(
        connector: Arc<dyn EngineConnector>,
        contract: Address,
        timeouts: StageTimeouts,
    ) -> AcquireResult {
        debug!("loading encryption engine module");
        run_stage(
            InitStage::LoadModule,
            timeouts.module_load,
            connector.load_module(),
        )
        .await?;
        debug!("running engine module setup");
        run_stage(
            InitStage::InitModule,
            timeouts.module_init,
            connector.init_module(),
        )
        .await?;
        debug!(%contract, "creating contract-bound engine instance");
        let instance = run_stage(
            InitStage::CreateInstance,
            timeouts.instance,
            connector.create_instance(contract),
        )
        .await?;
        debug!(%contract, "encryption engine ready");
        Ok(instance)
    }
}

async fn run_stage<T>(
    stage: InitStage,
    bound: Duration,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, EngineError> {
    match timeout(bound, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            let error = EngineError::StageFailed {
                stage,
                reason: format!("{err:#}"),
            };
            warn!(%stage, %error, "engine initialization stage failed");
            Err(error)
        }
        Err(_) => {
            let error = EngineError::StageTimeout {
                stage,
                timeout: bound,
            };
            warn!(%stage, %error, "engine initialization stage timed out");
            Err(error)
        }
    }
}
