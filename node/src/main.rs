use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use ethers::types::U256;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use consensus_validator::{DisputeArbitration, FraudLedger, HatConsensusValidator};
use node::chain::InMemoryChainClient;
use node::rpc::{self, AppState};
use node::validators::ValidatorPool;
use reputation_registry::ReputationRegistry;
use shared::database::{create_connection_pool, DatabaseConfig, PostgresKvStore};
use shared::messaging::{PeerNetwork, RedisPeerNetwork};
use vm_engine::EnhancedVmCoordinator;

/// Bootstrap validator pool size; must clear `consensus_validator::MIN_VALIDATORS`.
const BOOTSTRAP_VALIDATOR_COUNT: u64 = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let db_config = DatabaseConfig {
        host: std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("DATABASE_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5432),
        username: std::env::var("DATABASE_USER").unwrap_or_else(|_| "trustcore".to_string()),
        password: std::env::var("DATABASE_PASSWORD").unwrap_or_else(|_| "trustcore".to_string()),
        database_name: std::env::var("DATABASE_NAME").unwrap_or_else(|_| "trustcore".to_string()),
        ..DatabaseConfig::default()
    };

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let port = std::env::var("PORT").unwrap_or_else(|_| "8545".to_string()).parse::<u16>()?;

    info!("connecting to database at {}:{}", db_config.host, db_config.port);
    let pool = create_connection_pool(&db_config).await?;
    let kv_store: Arc<dyn shared::database::KvStore> = {
        let store = PostgresKvStore::new(pool);
        store.ensure_schema().await?;
        Arc::new(store)
    };

    let peers: Arc<dyn PeerNetwork> = Arc::new(RedisPeerNetwork::from_url(&redis_url)?);

    let registry = Arc::new(ReputationRegistry::new(kv_store.clone()));
    let consensus = Arc::new(HatConsensusValidator::new(peers.clone()));
    let fraud = Arc::new(FraudLedger::new(kv_store.clone(), peers.clone()));
    let dispute = Arc::new(DisputeArbitration::new(kv_store.clone(), peers.clone()));
    let validators = Arc::new(ValidatorPool::bootstrap(BOOTSTRAP_VALIDATOR_COUNT));
    let vm = Arc::new(EnhancedVmCoordinator::new());
    let chain = Arc::new(InMemoryChainClient::new(U256::from(200_000_000u64)));

    let state = AppState { chain, vm, registry, consensus, fraud, dispute, validators };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("node RPC surface starting on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(rpc::health))
        .route("/rpc/block_number", get(rpc::block_number))
        .route("/rpc/gas_price", get(rpc::gas_price))
        .route("/rpc/call", post(rpc::call))
        .route("/rpc/estimate_gas", post(rpc::estimate_gas))
        .route("/rpc/code/:address", get(rpc::get_code))
        .route("/rpc/storage/:address", post(rpc::get_storage_at))
        .route("/rpc/balance/:address", get(rpc::get_balance))
        .route("/rpc/transaction_count/:address", get(rpc::get_transaction_count))
        .route("/rpc/send_transaction", post(rpc::send_transaction))
        .route("/rpc/receipt/:tx_hash", get(rpc::get_transaction_receipt))
        .route("/rpc/trace/:tx_hash", get(rpc::trace_transaction))
        .route("/rpc/trace_call", post(rpc::trace_call))
        .route("/cross_chain/trust/:address", get(rpc::cross_chain::get_cross_chain_trust))
        .route("/cross_chain/chains", get(rpc::cross_chain::get_supported_chains))
        .route("/cross_chain/proof/:address", get(rpc::cross_chain::generate_trust_proof))
        .route("/cross_chain/proof/verify", post(rpc::cross_chain::verify_trust_proof))
        .route("/cross_chain/stats", get(rpc::cross_chain::get_cross_chain_stats))
        .route("/cross_chain/attest", post(rpc::cross_chain::send_trust_attestation));

    #[cfg(feature = "regtest")]
    let router = router
        .route("/regtest/mine", post(rpc::regtest::mine))
        .route("/regtest/snapshot", post(rpc::regtest::snapshot))
        .route("/regtest/revert", post(rpc::regtest::revert))
        .route("/regtest/set_next_block_timestamp", post(rpc::regtest::set_next_block_timestamp))
        .route("/regtest/increase_time", post(rpc::regtest::increase_time));

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}
