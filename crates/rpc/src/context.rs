//! Store and service wiring for the binary and tests

use banco_business::ServiceContext;
use banco_persistence::{PersistenceResult, SqliteStore, StoreConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Filesystem path behind a `sqlite:` URL, if it is a file database
pub fn database_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || database_url.contains("mode=memory") {
        return None;
    }
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Create the directory holding a file database
pub fn ensure_parent_dir(database_url: &str) -> std::io::Result<()> {
    if let Some(parent) = database_path(database_url)
        .as_deref()
        .and_then(|p| p.parent())
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Open the SQLite store (schema included) and wrap it in a context
pub async fn open(config: &StoreConfig) -> PersistenceResult<(SqliteStore, ServiceContext)> {
    let store = SqliteStore::open(config).await?;
    let ctx = ServiceContext::new(Arc::new(store.clone()));
    Ok((store, ctx))
}
