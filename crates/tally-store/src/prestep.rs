//! Write-capable scenario pre-steps: reset and seed.
//!
//! These run before the driven process starts and never while an inspector
//! holds the store open.

use std::path::Path;

use libsql::Builder;

use crate::error::StoreError;

/// Reference DDL for the wallet store, matching the application's JPA
/// mappings. Money columns are `NUMERIC` so exact decimals survive.
pub const REFERENCE_WALLET_DDL: &str = "\
CREATE TABLE IF NOT EXISTS usuarios (
    id TEXT PRIMARY KEY,
    nombre TEXT NOT NULL,
    apellido TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    documento TEXT NOT NULL UNIQUE,
    tipo_documento TEXT NOT NULL,
    activo INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT
);
CREATE TABLE IF NOT EXISTS cuentas (
    id TEXT PRIMARY KEY,
    numero_cuenta TEXT NOT NULL UNIQUE,
    saldo NUMERIC NOT NULL DEFAULT 0,
    moneda TEXT NOT NULL DEFAULT 'PEN',
    activa INTEGER NOT NULL DEFAULT 1,
    usuario_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT
);
CREATE TABLE IF NOT EXISTS transacciones (
    id TEXT PRIMARY KEY,
    tipo TEXT NOT NULL,
    monto NUMERIC NOT NULL,
    descripcion TEXT,
    saldo_anterior NUMERIC NOT NULL,
    saldo_nuevo NUMERIC NOT NULL,
    fecha_transaccion TEXT NOT NULL,
    cuenta_origen_id TEXT,
    cuenta_destino_id TEXT,
    cuenta_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// Delete the store file and its `SQLite` sidecars. Missing files are fine.
///
/// # Errors
///
/// Returns `StoreError::Io` if a file exists but cannot be removed.
pub fn reset_store(path: &Path) -> Result<(), StoreError> {
    remove_if_exists(path)?;
    for suffix in SIDECAR_SUFFIXES {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        remove_if_exists(Path::new(&sidecar))?;
    }
    tracing::info!(path = %path.display(), "store reset");
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    }
}

/// Open (creating if needed) the store read-write and run `sql` as a batch.
///
/// # Errors
///
/// Returns `StoreError::Setup` if the store cannot be opened or the batch
/// fails.
pub async fn seed_store(path: &Path, sql: &str) -> Result<(), StoreError> {
    let db = Builder::new_local(path)
        .build()
        .await
        .map_err(|e| StoreError::Setup(format!("open {}: {e}", path.display())))?;
    let conn = db
        .connect()
        .map_err(|e| StoreError::Setup(format!("connect {}: {e}", path.display())))?;
    conn.execute_batch(sql)
        .await
        .map_err(|e| StoreError::Setup(format!("seed {}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), bytes = sql.len(), "store seeded");
    Ok(())
}
