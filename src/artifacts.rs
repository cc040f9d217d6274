//! Game artifact storage layout.
//!
//! Uploaded artifacts live under `games/<game-id>/v<version>/game.py` inside
//! the storage data directory. The bytes are opaque to the platform; the
//! content hash recorded alongside each version is the SHA-256 of the bytes
//! at write time. The directory is single-writer (the developer handler for
//! the owning game) and multi-reader (download handler, match launcher).

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// File name of the stored artifact inside its version directory.
pub const ARTIFACT_FILE_NAME: &str = "game.py";

/// Directory of one uploaded version: `<games_root>/<game-id>/v<version>`.
pub fn version_dir(games_root: &Path, game_id: u64, version: &str) -> PathBuf {
    games_root.join(game_id.to_string()).join(format!("v{version}"))
}

/// Hex SHA-256 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write an artifact, creating the version directory as needed. Returns the
/// stored file path.
pub async fn save_artifact(
    games_root: &Path,
    game_id: u64,
    version: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    let dir = version_dir(games_root, game_id, version);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(ARTIFACT_FILE_NAME);
    tokio::fs::write(&path, bytes).await?;
    tracing::info!(game_id, version, path = %path.display(), size = bytes.len(), "stored artifact");
    Ok(path)
}

/// Read a stored artifact back.
pub async fn read_artifact(path: &Path) -> std::io::Result<Vec<u8>> {
    tokio::fs::read(path).await
}

/// Whether the stored artifact can be spawned directly as a match service.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
