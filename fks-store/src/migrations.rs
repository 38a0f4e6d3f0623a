//! The migration runner: applies `.sql` files from a directory in
//! lexical order, recording `(filename, sha256_checksum, applied_at)` in
//! `schema_migrations`. A checksum mismatch on a previously-applied file
//! aborts startup before any new migration is applied.
//! `FKS_SKIP_MIGRATIONS` bypasses the runner entirely.

use std::collections::HashMap;
use std::path::Path;

use fks_types::FksError;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};

/// One `.sql` file discovered on disk: its name, contents, and checksum.
#[derive(Debug, Clone)]
pub struct MigrationFile {
    /// File name (not full path), used as the `schema_migrations` key.
    pub filename: String,
    /// Raw SQL contents.
    pub sql: String,
    /// Hex-encoded SHA-256 of `sql`.
    pub checksum: String,
}

/// Hex-encoded SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// List every `.sql` file in `dir`, sorted lexically by filename, with its
/// contents and checksum computed.
///
/// # Errors
/// Returns `FksError::Config` if `dir` cannot be read, or if any entry
/// cannot be read as UTF-8 SQL.
pub fn collect_migration_files(dir: &Path) -> Result<Vec<MigrationFile>, FksError> {
    let mut names: Vec<std::path::PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| FksError::Config(format!("read migrations dir {}: {e}", dir.display())))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("sql"))
        .collect();
    names.sort();

    names
        .into_iter()
        .map(|path| {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let sql = std::fs::read_to_string(&path)
                .map_err(|e| FksError::Config(format!("read migration {}: {e}", path.display())))?;
            let checksum = sha256_hex(sql.as_bytes());
            Ok(MigrationFile { filename, sql, checksum })
        })
        .collect()
}

/// Apply every pending `.sql` file under `dir` to `pool`, in lexical order.
///
/// Before applying anything, every already-applied file still present on
/// disk has its checksum re-verified against the recorded value; a mismatch
/// aborts with `FksError::Persistence` before any new migration runs.
/// Returns the filenames actually applied this call (empty if all were
/// already applied, or if `FKS_SKIP_MIGRATIONS` is set).
///
/// # Errors
/// Returns `FksError::Persistence` on a checksum mismatch or any SQL
/// execution failure; `FksError::Config` if `dir` cannot be read.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<Vec<String>, FksError> {
    if std::env::var("FKS_SKIP_MIGRATIONS").is_ok() {
        #[cfg(feature = "tracing")]
        tracing::warn!("FKS_SKIP_MIGRATIONS set, skipping migration runner");
        return Ok(Vec::new());
    }

    crate::schema::ensure_schema(pool).await?;

    let files = collect_migration_files(dir)?;

    let applied_rows = sqlx::query("SELECT filename, checksum FROM schema_migrations")
        .fetch_all(pool)
        .await
        .map_err(|e| FksError::Persistence(format!("read schema_migrations: {e}")))?;
    let applied: HashMap<String, String> = applied_rows
        .iter()
        .map(|row| (row.get::<String, _>("filename"), row.get::<String, _>("checksum")))
        .collect();

    for file in &files {
        if let Some(recorded) = applied.get(&file.filename)
            && recorded != &file.checksum
        {
            return Err(FksError::Persistence(format!(
                "checksum mismatch for already-applied migration {}: recorded={} current={}",
                file.filename, recorded, file.checksum
            )));
        }
    }

    let mut newly_applied = Vec::new();
    for file in files {
        if applied.contains_key(&file.filename) {
            continue;
        }
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| FksError::Persistence(format!("migration tx begin: {e}")))?;
        sqlx::query(&file.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| FksError::Persistence(format!("applying {}: {e}", file.filename)))?;
        sqlx::query("INSERT INTO schema_migrations (filename, checksum) VALUES ($1, $2)")
            .bind(&file.filename)
            .bind(&file.checksum)
            .execute(&mut *tx)
            .await
            .map_err(|e| FksError::Persistence(format!("recording {}: {e}", file.filename)))?;
        tx.commit()
            .await
            .map_err(|e| FksError::Persistence(format!("migration tx commit: {e}")))?;
        #[cfg(feature = "tracing")]
        tracing::info!(filename = %file.filename, "applied migration");
        newly_applied.push(file.filename);
    }
    Ok(newly_applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn collects_sql_files_in_lexical_order() {
        let dir = std::env::temp_dir().join(format!("fks-migrations-test-{}-a", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write(&dir, "0002_second.sql", "SELECT 2;");
        write(&dir, "0001_first.sql", "SELECT 1;");
        write(&dir, "readme.txt", "not sql");

        let files = collect_migration_files(&dir).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "0001_first.sql");
        assert_eq!(files[1].filename, "0002_second.sql");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn checksum_changes_when_file_contents_change() {
        let a = sha256_hex(b"SELECT 1;");
        let b = sha256_hex(b"SELECT 1; -- modified");
        assert_ne!(a, b);
    }

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(sha256_hex(b"same"), sha256_hex(b"same"));
    }
}
