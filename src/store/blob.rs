/// Content-addressed archive for original document text
///
/// Ingested sources are archived verbatim so re-segmentation after a
/// config change never needs the original files. Content is addressed by
/// blake3 hash, sharded two levels deep, and zstd-compressed past a size
/// threshold.
use crate::error::{DadyarError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const ZSTD_LEVEL: i32 = 3;

pub struct ArchiveStore {
    base_path: PathBuf,
    compression_threshold: usize,
}

impl ArchiveStore {
    pub fn new(base_path: &Path, compression_threshold: usize) -> Result<Self> {
        let base_path = base_path.join("archive");
        fs::create_dir_all(&base_path).map_err(|e| DadyarError::Io {
            source: e,
            context: format!("creating archive directory {}", base_path.display()),
        })?;

        Ok(Self {
            base_path,
            compression_threshold,
        })
    }

    /// Archive a document's text. Returns (hash, newly_written).
    pub fn store(&self, text: &str) -> Result<(String, bool)> {
        let data = text.as_bytes();
        let hash = format!("{:.32}", blake3::hash(data).to_hex());

        let path = self.archive_path(&hash);
        if path.exists() {
            return Ok((hash, false));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| DadyarError::Io {
                source: e,
                context: format!("creating archive shard {}", parent.display()),
            })?;
        }

        let payload = if data.len() >= self.compression_threshold {
            zstd::encode_all(data, ZSTD_LEVEL).map_err(|e| DadyarError::Io {
                source: e,
                context: format!("compressing archive entry {}", hash),
            })?
        } else {
            data.to_vec()
        };

        // Write to a temp file and rename so readers never see partial content
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| DadyarError::Io {
            source: e,
            context: format!("creating {}", temp_path.display()),
        })?;
        file.write_all(&payload).map_err(|e| DadyarError::Io {
            source: e,
            context: format!("writing {}", temp_path.display()),
        })?;
        file.sync_all().map_err(|e| DadyarError::Io {
            source: e,
            context: format!("syncing {}", temp_path.display()),
        })?;
        fs::rename(&temp_path, &path).map_err(|e| DadyarError::Io {
            source: e,
            context: format!("renaming {} into place", temp_path.display()),
        })?;

        Ok((hash, true))
    }

    /// Read archived text back by hash
    pub fn read(&self, hash: &str) -> Result<String> {
        let path = self.archive_path(hash);
        let raw = fs::read(&path).map_err(|e| DadyarError::Io {
            source: e,
            context: format!("reading archive entry {}", hash),
        })?;

        // Entries below the threshold were stored uncompressed
        let bytes = match zstd::decode_all(raw.as_slice()) {
            Ok(decompressed) => decompressed,
            Err(_) => raw,
        };

        String::from_utf8(bytes)
            .map_err(|e| DadyarError::Config(format!("Archive entry {} is not UTF-8: {}", hash, e)))
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.archive_path(hash).exists()
    }

    fn archive_path(&self, hash: &str) -> PathBuf {
        // Shard by hash prefix to keep directory fanout flat
        if hash.len() >= 4 {
            self.base_path
                .join(&hash[0..2])
                .join(&hash[2..4])
                .join(hash)
        } else {
            self.base_path.join(hash)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archive(threshold: usize) -> (TempDir, ArchiveStore) {
        let dir = TempDir::new().unwrap();
        let store = ArchiveStore::new(dir.path(), threshold).unwrap();
        (dir, store)
    }

    #[test]
    fn test_store_and_read_small() {
        let (_dir, store) = archive(4096);
        let text = "ماده ۱ همه افراد در برابر قانون برابرند.";

        let (hash, new) = store.store(text).unwrap();
        assert!(new);
        assert_eq!(hash.len(), 32);
        assert!(store.exists(&hash));
        assert_eq!(store.read(&hash).unwrap(), text);
    }

    #[test]
    fn test_store_is_idempotent() {
        let (_dir, store) = archive(4096);
        let (first, new) = store.store("متن قانون").unwrap();
        let (second, new_again) = store.store("متن قانون").unwrap();

        assert_eq!(first, second);
        assert!(new);
        assert!(!new_again);
    }

    #[test]
    fn test_large_entry_compressed_roundtrip() {
        let (dir, store) = archive(64);
        let text = "تبصره تکراری برای فشرده سازی. ".repeat(50);

        let (hash, _) = store.store(&text).unwrap();
        assert_eq!(store.read(&hash).unwrap(), text);

        // On-disk payload is smaller than the original
        let path = dir
            .path()
            .join("archive")
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(&hash);
        let on_disk = std::fs::metadata(path).unwrap().len() as usize;
        assert!(on_disk < text.len());
    }

    #[test]
    fn test_missing_entry_errors() {
        let (_dir, store) = archive(4096);
        assert!(!store.exists("0123456789abcdef0123456789abcdef"));
        assert!(store.read("0123456789abcdef0123456789abcdef").is_err());
    }
}
