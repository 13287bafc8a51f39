//! `dbe-item`: encrypts and decrypts items read as JSON lines on stdin.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from `DBE_*` environment variables.
//! 2. Initialise structured logging.
//! 3. Load the table configuration and build the keyring.
//! 4. Build the [`ItemEncryptor`], with beacons when a beacon key is set.
//! 5. Process stdin until EOF and exit with the first failure's status.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use item_encryptor::{telemetry, BeaconKeyCache, Config, ItemEncryptor, Keyring, RawAesKeyring};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Logging is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(&cfg.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "dbe-item starting");

    // -----------------------------------------------------------------------
    // 3. Table and keyring
    // -----------------------------------------------------------------------
    let table = cfg.load_table()?;
    info!(
        table = %table.table_name,
        suite = ?table.algorithm_suite_id,
        attributes = table.attribute_actions_on_encrypt.len(),
        "table configuration loaded"
    );
    let keyring: Arc<dyn Keyring> = Arc::new(RawAesKeyring::new(
        cfg.key_namespace.clone(),
        cfg.key_name.clone(),
        cfg.wrapping_key_bytes()?,
    ));

    // -----------------------------------------------------------------------
    // 4. Encryptor
    // -----------------------------------------------------------------------
    let encryptor = match cfg.beacon_material()? {
        Some(material) => {
            ItemEncryptor::with_beacons(table, keyring, material, Arc::new(BeaconKeyCache::new()))
        }
        None => ItemEncryptor::new(table, keyring),
    }
    .context("failed to build item encryptor")?;

    // -----------------------------------------------------------------------
    // 5. Records
    // -----------------------------------------------------------------------
    let exit_code =
        item_encryptor::host::run(Arc::new(encryptor), tokio::io::stdin(), tokio::io::stdout())
            .await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
