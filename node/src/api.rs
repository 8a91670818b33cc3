//! # REST API
//!
//! Builds the axum router that exposes the wallet node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                            | Description                        |
//! |--------|---------------------------------|------------------------------------|
//! | GET    | `/health`                       | Liveness probe                     |
//! | GET    | `/status`                       | Node status summary                |
//! | GET    | `/assets`                       | List registered assets             |
//! | POST   | `/assets`                       | Define or import an asset          |
//! | GET    | `/assets/:moniker`              | One asset definition               |
//! | DELETE | `/assets/:moniker`              | Forget an asset (registry only)    |
//! | GET    | `/resolve/:moniker/:txid/:vout` | Color value of an output           |
//! | POST   | `/transactions`                 | Index a ledger transaction         |
//! | GET    | `/addresses`                    | Wallet addresses                   |
//! | POST   | `/addresses`                    | Generate a fresh wallet address    |
//! | POST   | `/compose`                      | Build an unsigned transfer draft   |
//! | POST   | `/issue`                        | Build an issuance draft + register |
//! | POST   | `/sign`                         | Sign a draft with wallet keys      |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use chroma_protocol::asset::{AssetDefinition, AssetError, AssetRegistry};
use chroma_protocol::compose::{
    CandidateOutput, ComposeError, Composer, TransferTarget, UnsignedDraft,
};
use chroma_protocol::graph::{LedgerTransaction, LockScript, OutPoint, TxId, TxStore};
use chroma_protocol::kernel::KernelId;
use chroma_protocol::resolve::{ColorResolver, ResolveError, ResolvedOutput};
use chroma_protocol::wallet::{DraftSigner, Keychain, KeychainSigner, SignError};

use crate::metrics::SharedMetrics;

/// Store metadata key under which the registry export lives.
pub const REGISTRY_META_KEY: &str = "asset_registry";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc` or a handle that is.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier ("mainnet", "testnet").
    pub network: String,
    /// Persistent transaction index; also the resolver's graph source.
    pub store: Arc<TxStore>,
    /// Wallet-local asset definitions.
    pub registry: Arc<AssetRegistry>,
    /// The memoizing resolution engine over `store`.
    pub resolver: ColorResolver<TxStore>,
    /// Draft construction.
    pub composer: Composer,
    /// Wallet keys; change addresses and signing come from here.
    pub keychain: Arc<Keychain>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Serializes registry export + store write so concurrent asset
    /// mutations cannot interleave and persist a stale snapshot.
    pub persist_guard: Arc<parking_lot::Mutex<()>>,
}

impl AppState {
    /// Writes the current registry export into the store's metadata tree.
    fn persist_registry(&self) {
        let _guard = self.persist_guard.lock();
        let exported = self.registry.export();
        if let Err(e) = self.store.put_meta(REGISTRY_META_KEY, exported.as_bytes()) {
            tracing::warn!("failed to persist asset registry: {}", e);
        }
        self.metrics.assets_registered.set(self.registry.len() as i64);
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// A handler failure carrying the HTTP status it maps to.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<AssetError> for ApiError {
    fn from(err: AssetError) -> Self {
        let status = match &err {
            AssetError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            AssetError::DuplicateMoniker(_) => StatusCode::CONFLICT,
            AssetError::InvalidMoniker(_) | AssetError::BadDescriptor(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        let status = match &err {
            // A missing transaction is data unavailability, not "no color".
            ResolveError::UnknownTransaction(_) => StatusCode::NOT_FOUND,
            ResolveError::DepthExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ResolveError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<ComposeError> for ApiError {
    fn from(err: ComposeError) -> Self {
        let status = match &err {
            ComposeError::InsufficientFunds { .. }
            | ComposeError::InsufficientBaseFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ComposeError::NoTransfers
            | ComposeError::ZeroAmount(_)
            | ComposeError::IncompatibleKernels { .. }
            | ComposeError::DraftTooLarge { .. } => StatusCode::BAD_REQUEST,
            ComposeError::ManifestMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<SignError> for ApiError {
    fn from(err: SignError) -> Self {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured RPC port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/assets", get(list_assets_handler).post(define_asset_handler))
        .route(
            "/assets/:moniker",
            get(get_asset_handler).delete(remove_asset_handler),
        )
        .route("/resolve/:moniker/:txid/:vout", get(resolve_handler))
        .route("/transactions", post(index_transaction_handler))
        .route(
            "/addresses",
            get(list_addresses_handler).post(new_address_handler),
        )
        .route("/compose", post(compose_handler))
        .route("/issue", post(issue_handler))
        .route("/sign", post(sign_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// Transactions held by the local index.
    pub indexed_transactions: usize,
    /// Registered asset definitions.
    pub assets: usize,
    /// Entries in the resolution cache.
    pub cache_entries: usize,
    /// Wallet addresses held.
    pub addresses: usize,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// One registered asset, as the API reports it.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Local moniker.
    pub moniker: String,
    /// Portable descriptor string.
    pub descriptor: String,
    /// Kernel identity.
    pub kernel: String,
    /// Genesis outpoint, `txid:vout`.
    pub genesis: String,
}

impl From<AssetDefinition> for AssetInfo {
    fn from(asset: AssetDefinition) -> Self {
        Self {
            descriptor: asset.descriptor(),
            kernel: asset.kernel.to_string(),
            genesis: asset.genesis.to_string(),
            moniker: asset.moniker,
        }
    }
}

/// Request payload for `POST /assets`: either a full definition or a
/// descriptor to import under a local moniker.
#[derive(Debug, Deserialize)]
pub struct DefineAssetRequest {
    /// Local moniker to register under.
    pub moniker: String,
    /// Portable descriptor. When present, `genesis`/`kernel` are ignored.
    pub descriptor: Option<String>,
    /// Genesis txid (hex) for a direct definition.
    pub genesis_txid: Option<String>,
    /// Genesis output index for a direct definition.
    pub genesis_vout: Option<u32>,
    /// Kernel identity string for a direct definition.
    pub kernel: Option<String>,
}

/// Response payload for `POST /transactions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexedResponse {
    /// Id of the transaction that was indexed.
    pub txid: String,
}

/// One requested movement in a `POST /compose` body.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Moniker of a registered asset.
    pub asset: String,
    /// Units to move.
    pub amount: u64,
    /// Destination address.
    pub to: String,
}

/// Request payload for `POST /compose`.
#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    /// Ordered transfer list.
    pub transfers: Vec<TransferRequest>,
    /// Change address for colored change; a fresh wallet address when
    /// omitted.
    pub change_address: Option<String>,
    /// Change address for uncolored change; a fresh wallet address when
    /// omitted.
    pub base_change_address: Option<String>,
}

/// Response payload for `POST /compose` and the draft half of `/issue`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DraftResponse {
    /// The unsigned draft.
    pub draft: UnsignedDraft,
    /// The id the signed transaction will carry.
    pub expected_txid: String,
}

/// Request payload for `POST /issue`.
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    /// Moniker to register the new asset under.
    pub moniker: String,
    /// Kernel identity string ("obc", "epobc").
    pub kernel: String,
    /// Units of supply to declare.
    pub supply: u64,
    /// Address to issue to; a fresh wallet address when omitted.
    pub to: Option<String>,
}

/// Response payload for `POST /issue`.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueResponse {
    /// The unsigned issuance draft.
    pub draft: UnsignedDraft,
    /// The id the signed transaction will carry.
    pub expected_txid: String,
    /// Genesis outpoint the draft will create, `txid:vout`.
    pub genesis: String,
    /// The registered asset.
    pub asset: AssetInfo,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> &'static str {
    "ok"
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        indexed_transactions: state.store.len(),
        assets: state.registry.len(),
        cache_entries: state.resolver.cache_len(),
        addresses: state.keychain.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn list_assets_handler(State(state): State<AppState>) -> Json<Vec<AssetInfo>> {
    Json(state.registry.list().into_iter().map(AssetInfo::from).collect())
}

async fn define_asset_handler(
    State(state): State<AppState>,
    Json(request): Json<DefineAssetRequest>,
) -> Result<(StatusCode, Json<AssetInfo>), ApiError> {
    let asset = if let Some(descriptor) = &request.descriptor {
        state.registry.import(request.moniker.clone(), descriptor)?
    } else {
        let txid_hex = request.genesis_txid.as_deref().ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, "missing descriptor or genesis_txid")
        })?;
        let txid = TxId::from_hex(txid_hex).map_err(|_| {
            ApiError::new(StatusCode::BAD_REQUEST, format!("bad genesis txid: {txid_hex:?}"))
        })?;
        let vout = request.genesis_vout.ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, "missing genesis_vout")
        })?;
        let kernel: KernelId = request
            .kernel
            .as_deref()
            .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "missing kernel"))?
            .parse()
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("{e}")))?;
        state
            .registry
            .define(request.moniker.clone(), OutPoint::new(txid, vout), kernel)?
    };

    state.persist_registry();
    Ok((StatusCode::CREATED, Json(asset.into())))
}

async fn get_asset_handler(
    State(state): State<AppState>,
    Path(moniker): Path<String>,
) -> Result<Json<AssetInfo>, ApiError> {
    Ok(Json(state.registry.lookup(&moniker)?.into()))
}

async fn remove_asset_handler(
    State(state): State<AppState>,
    Path(moniker): Path<String>,
) -> Result<Json<AssetInfo>, ApiError> {
    let removed = state.registry.remove(&moniker)?;
    state.persist_registry();
    Ok(Json(removed.into()))
}

async fn resolve_handler(
    State(state): State<AppState>,
    Path((moniker, txid, vout)): Path<(String, String, u32)>,
) -> Result<Json<ResolvedOutput>, ApiError> {
    // Moniker lookup fails before any ledger access is attempted.
    let asset = state.registry.lookup(&moniker)?;
    let txid = TxId::from_hex(&txid)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, format!("bad txid: {txid:?}")))?;

    let timer = state.metrics.resolution_latency_seconds.start_timer();
    let resolved = state.resolver.resolve(&asset, OutPoint::new(txid, vout)).await;
    timer.observe_duration();

    state.metrics.resolutions_total.inc();
    state
        .metrics
        .resolution_cache_entries
        .set(state.resolver.cache_len() as i64);
    Ok(Json(resolved?))
}

async fn index_transaction_handler(
    State(state): State<AppState>,
    Json(tx): Json<LedgerTransaction>,
) -> Result<(StatusCode, Json<IndexedResponse>), ApiError> {
    // The id is content-derived; a mismatch means the payload was edited
    // after construction and nothing downstream should trust it.
    if tx.compute_id() != tx.id {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "transaction id does not match its contents",
        ));
    }
    state
        .store
        .insert_transaction(&tx)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    state.metrics.transactions_indexed_total.inc();
    state.metrics.store_transactions.set(state.store.len() as i64);
    Ok((
        StatusCode::CREATED,
        Json(IndexedResponse {
            txid: tx.id.to_hex(),
        }),
    ))
}

async fn list_addresses_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.keychain.addresses())
}

async fn new_address_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<String>), ApiError> {
    let address = state
        .keychain
        .generate_address()
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(address)))
}

async fn compose_handler(
    State(state): State<AppState>,
    Json(request): Json<ComposeRequest>,
) -> Result<Json<DraftResponse>, ApiError> {
    let mut transfers = Vec::with_capacity(request.transfers.len());
    for transfer in &request.transfers {
        let asset = state.registry.lookup(&transfer.asset)?;
        transfers.push(TransferTarget::new(
            asset,
            transfer.amount,
            LockScript::Address(transfer.to.clone()),
        ));
    }

    let assets: Vec<AssetDefinition> = transfers.iter().map(|t| t.asset.clone()).collect();
    let candidates = gather_candidates(&state, &assets).await?;

    let change = lock_or_fresh(&state, request.change_address.as_deref())?;
    let base_change = lock_or_fresh(&state, request.base_change_address.as_deref())?;
    let draft = state
        .composer
        .compose(&candidates, &transfers, |_| change.clone(), base_change)?;

    state.metrics.drafts_composed_total.inc();
    Ok(Json(DraftResponse {
        expected_txid: draft.expected_txid().to_hex(),
        draft,
    }))
}

async fn issue_handler(
    State(state): State<AppState>,
    Json(request): Json<IssueRequest>,
) -> Result<(StatusCode, Json<IssueResponse>), ApiError> {
    let kernel: KernelId = request
        .kernel
        .parse()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("{e}")))?;

    let candidates = gather_candidates(&state, &[]).await?;
    let to = lock_or_fresh(&state, request.to.as_deref())?;
    let base_change = lock_or_fresh(&state, None)?;

    let issuance = state.composer.compose_issuance(
        &request.moniker,
        kernel,
        request.supply,
        to,
        &candidates,
        base_change,
    )?;
    // Registering against the expected txid is sound: signing does not
    // change a transaction's id.
    let asset = state
        .registry
        .define(request.moniker.clone(), issuance.genesis, kernel)?;

    state.persist_registry();
    state.metrics.drafts_composed_total.inc();
    Ok((
        StatusCode::CREATED,
        Json(IssueResponse {
            expected_txid: issuance.draft.expected_txid().to_hex(),
            genesis: issuance.genesis.to_string(),
            asset: asset.into(),
            draft: issuance.draft,
        }),
    ))
}

async fn sign_handler(
    State(state): State<AppState>,
    Json(draft): Json<UnsignedDraft>,
) -> Result<Json<chroma_protocol::graph::SignedTransaction>, ApiError> {
    let signer = KeychainSigner::new(state.keychain.clone());
    Ok(Json(signer.sign_draft(&draft)?))
}

// ---------------------------------------------------------------------------
// Handler helpers
// ---------------------------------------------------------------------------

/// Scans the wallet's unspent outputs and resolves each against the given
/// assets, producing composer candidates.
///
/// Outputs whose resolution hits a missing ancestor are skipped rather
/// than failing the whole composition — the wallet simply cannot prove
/// their color, so it does not spend them as colored.
async fn gather_candidates(
    state: &AppState,
    assets: &[AssetDefinition],
) -> Result<Vec<CandidateOutput>, ApiError> {
    let addresses = state.keychain.addresses();
    let filter = if addresses.is_empty() {
        None
    } else {
        Some(addresses.as_slice())
    };
    let unspent = state
        .store
        .unspent_outputs(filter)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let mut distinct: Vec<&AssetDefinition> = Vec::new();
    for asset in assets {
        if !distinct.contains(&asset) {
            distinct.push(asset);
        }
    }

    let mut candidates = Vec::with_capacity(unspent.len());
    'outputs: for (outpoint, output) in unspent {
        let mut color = None;
        for asset in &distinct {
            match state.resolver.resolve(asset, outpoint).await {
                Ok(resolved) if resolved.is_colored() => {
                    color = Some(((*asset).clone(), resolved.value));
                    break;
                }
                Ok(_) => {}
                Err(ResolveError::UnknownTransaction(txid)) => {
                    tracing::warn!(outpoint = %outpoint, missing = %txid, "skipping unprovable output");
                    continue 'outputs;
                }
                Err(e) => return Err(e.into()),
            }
        }
        match color {
            Some((asset, value)) => candidates.push(CandidateOutput::colored(
                outpoint,
                output.value,
                output.lock,
                asset,
                value,
            )),
            None => candidates.push(CandidateOutput::uncolored(
                outpoint,
                output.value,
                output.lock,
            )),
        }
    }
    Ok(candidates)
}

/// Uses the given address, or generates a fresh wallet address.
fn lock_or_fresh(state: &AppState, address: Option<&str>) -> Result<LockScript, ApiError> {
    let address = match address {
        Some(addr) => addr.to_string(),
        None => state
            .keychain
            .generate_address()
            .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?,
    };
    Ok(LockScript::Address(address))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
