//! Manifest computation over the sync whitelist
//!
//! Each file is hashed with chunked SHA-256 (large files off the request
//! path via `spawn_blocking`); entries are sorted by path and the etag is
//! derived from the sorted `(path, sha256)` pairs only.

use std::path::{Component, Path, PathBuf};

use serde_json::json;
use sha2::{Digest, Sha256};

use msr_common::model::{Manifest, ManifestEntry};
use msr_common::{Error, Result};

/// Files above this size are hashed on the blocking pool
const OFFLOAD_HASH_BYTES: u64 = 1024 * 1024;

/// Hash chunk size
const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Validate a whitelist-relative path: POSIX separators, no traversal, no
/// absolute components.
pub fn safe_relative(path: &str) -> bool {
    if path.is_empty() || path.contains('\\') || path.starts_with('/') {
        return false;
    }
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Category for UI grouping: the top-level directory name.
fn classify(rel_path: &str) -> String {
    match rel_path.split('/').next() {
        Some(top) if top != rel_path => top.to_string(),
        _ => "misc".to_string(),
    }
}

fn hash_bytes_chunked(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in bytes.chunks(HASH_CHUNK_BYTES) {
        hasher.update(chunk);
    }
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of one file, offloaded for large files.
pub async fn hash_file(path: &Path, size_bytes: u64) -> Result<String> {
    if size_bytes > OFFLOAD_HASH_BYTES {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<String> {
            use std::io::Read;
            let mut file = std::fs::File::open(&path)?;
            let mut hasher = Sha256::new();
            let mut buffer = vec![0u8; HASH_CHUNK_BYTES];
            loop {
                let n = file.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(format!("{:x}", hasher.finalize()))
        })
        .await
        .map_err(|e| Error::Internal(format!("hash task failed: {}", e)))?
    } else {
        let bytes = tokio::fs::read(path).await?;
        Ok(hash_bytes_chunked(&bytes))
    }
}

/// Walk the whitelist and build the manifest. Missing files are skipped.
pub async fn build_manifest(base_dir: &Path, whitelist: &[String]) -> Result<Manifest> {
    let mut files = Vec::with_capacity(whitelist.len());

    for rel in whitelist {
        if !safe_relative(rel) {
            continue;
        }
        let abs: PathBuf = base_dir.join(rel);
        let metadata = match tokio::fs::metadata(&abs).await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };

        let size_bytes = metadata.len();
        let sha256 = hash_file(&abs, size_bytes).await?;
        let mtime_unix = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        files.push(ManifestEntry {
            path: rel.clone(),
            sha256,
            mtime_unix,
            size_bytes,
            category: classify(rel),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    let etag = compute_etag(&files);

    Ok(Manifest {
        etag,
        file_count: files.len(),
        files,
    })
}

/// Etag over the sorted `(path, sha256)` pairs as canonical JSON. Mtime,
/// size, and category never participate.
pub fn compute_etag(files: &[ManifestEntry]) -> String {
    let pairs: Vec<_> = files
        .iter()
        .map(|f| json!({"path": f.path, "sha256": f.sha256}))
        .collect();
    let canonical = serde_json::to_string(&pairs).unwrap_or_default();
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_relative() {
        assert!(safe_relative("content/welcome.md"));
        assert!(safe_relative("flat.txt"));
        assert!(!safe_relative("/etc/passwd"));
        assert!(!safe_relative("../outside.txt"));
        assert!(!safe_relative("content/../../outside"));
        assert!(!safe_relative(""));
        assert!(!safe_relative("win\\path.txt"));
    }

    #[test]
    fn test_classify_top_dir() {
        assert_eq!(classify("content/welcome.md"), "content");
        assert_eq!(classify("clients/app.json"), "clients");
        assert_eq!(classify("flat.txt"), "misc");
    }

    #[test]
    fn test_etag_ignores_mtime_and_size() {
        let base = ManifestEntry {
            path: "a.txt".into(),
            sha256: "aa".into(),
            mtime_unix: 1,
            size_bytes: 10,
            category: "misc".into(),
        };
        let mut other = base.clone();
        other.mtime_unix = 999;
        other.size_bytes = 999;
        assert_eq!(compute_etag(&[base.clone()]), compute_etag(&[other]));

        let mut changed = base;
        changed.sha256 = "bb".into();
        assert_ne!(compute_etag(&[changed.clone()]), {
            let mut original = changed.clone();
            original.sha256 = "aa".into();
            compute_etag(&[original])
        });
    }

    #[tokio::test]
    async fn test_build_manifest_skips_missing_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("content")).unwrap();
        std::fs::write(dir.path().join("content/b.txt"), b"bbb").unwrap();
        std::fs::write(dir.path().join("content/a.txt"), b"aaa").unwrap();

        let whitelist = vec![
            "content/b.txt".to_string(),
            "content/a.txt".to_string(),
            "content/missing.txt".to_string(),
        ];
        let manifest = build_manifest(dir.path(), &whitelist).await.unwrap();

        assert_eq!(manifest.file_count, 2);
        assert_eq!(manifest.files[0].path, "content/a.txt");
        assert_eq!(manifest.files[1].path, "content/b.txt");
        assert_eq!(manifest.files[0].sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_manifest_etag_changes_only_with_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"one").unwrap();
        let whitelist = vec!["f.txt".to_string()];

        let first = build_manifest(dir.path(), &whitelist).await.unwrap();
        let second = build_manifest(dir.path(), &whitelist).await.unwrap();
        assert_eq!(first.etag, second.etag);

        std::fs::write(dir.path().join("f.txt"), b"two").unwrap();
        let third = build_manifest(dir.path(), &whitelist).await.unwrap();
        assert_ne!(first.etag, third.etag);
    }

    #[tokio::test]
    async fn test_large_file_hash_matches_small_path() {
        let dir = tempfile::tempdir().unwrap();
        let big = vec![7u8; (OFFLOAD_HASH_BYTES + 10) as usize];
        std::fs::write(dir.path().join("big.bin"), &big).unwrap();
        std::fs::write(dir.path().join("small.bin"), &big).unwrap();

        let from_blocking = hash_file(&dir.path().join("big.bin"), big.len() as u64)
            .await
            .unwrap();
        // Force the in-line path by lying about the size
        let inline = hash_file(&dir.path().join("small.bin"), 10).await.unwrap();
        assert_eq!(from_blocking, inline);
    }
}
