use std::error::Error;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing_subscriber::EnvFilter;

use raffle_ledger::api;
use raffle_ledger::cipher::{KeyProvider, StaticKeyProvider};
use raffle_ledger::config::LedgerConfig;
use raffle_ledger::store::MemoryStore;
use raffle_ledger::RaffleLedger;

fn key_provider(config: &LedgerConfig) -> Result<Arc<dyn KeyProvider>, Box<dyn Error>> {
    match config.instant_win_secret.as_deref() {
        Some(secret) => {
            let keys = StaticKeyProvider::from_secret(secret)
                .map_err(|e| format!("instant-win key: {e}"))?;
            Ok(Arc::new(keys))
        }
        None => {
            // Ephemeral key: sealed records only open within this process.
            tracing::warn!("RAFFLE_LEDGER_INSTANT_WIN_SECRET unset, using a random instant-win key");
            let mut key = [0u8; 32];
            OsRng.fill_bytes(&mut key);
            Ok(Arc::new(StaticKeyProvider::from_key(key)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LedgerConfig::from_env().map_err(|e| format!("configuration: {e}"))?;
    if config.admin_token.is_none() {
        tracing::warn!("RAFFLE_LEDGER_ADMIN_TOKEN unset, admin routes will refuse every request");
    }

    let keys = key_provider(&config)?;
    let bind_address = config.bind_address.clone();
    let ledger = Arc::new(RaffleLedger::new(MemoryStore::new(), config, keys));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "raffle ledger listening");
    axum::serve(listener, api::router(ledger)).await?;
    Ok(())
}
