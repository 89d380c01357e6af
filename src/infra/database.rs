// Shared SQLite pool for every store.

use anyhow::Context as _;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open (creating if needed) the database file at `path`.
pub async fn connect(path: &Path) -> anyhow::Result<SqlitePool> {
    // Keep runtime databases in their own folder so the repo root stays tidy.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;

    Ok(pool)
}
