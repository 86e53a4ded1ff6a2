// File: ./src/storage.rs
// Small file helpers shared by the config, token and journal files.
use crate::context::AppContext;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};

pub struct LocalStorage;

impl LocalStorage {
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Runs `f` while holding an exclusive lock on a sibling `.lock` file.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// The cached authorization token, if one was saved earlier.
    pub fn load_token(ctx: &dyn AppContext) -> Option<String> {
        let path = ctx.get_token_path().ok()?;
        if !path.exists() {
            return None;
        }
        let token = Self::with_lock(&path, || Ok(fs::read_to_string(&path)?)).ok()?;
        let token = token.trim().to_string();
        (!token.is_empty()).then_some(token)
    }

    pub fn save_token(ctx: &dyn AppContext, token: &str) -> Result<()> {
        let path = ctx.get_token_path()?;
        Self::with_lock(&path, || Self::atomic_write(&path, token))
            .with_context(|| format!("Failed to save token to {:?}", path))
    }

    pub fn clear_token(ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_token_path()?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    #[test]
    fn test_lock_path_keeps_extension() {
        assert_eq!(
            LocalStorage::get_lock_path(Path::new("/tmp/import_journal.json")),
            PathBuf::from("/tmp/import_journal.json.lock")
        );
        assert_eq!(
            LocalStorage::get_lock_path(Path::new("/tmp/auth_token")),
            PathBuf::from("/tmp/auth_token.lock")
        );
    }

    #[test]
    fn test_token_roundtrip() {
        let ctx = TestContext::new();
        assert_eq!(LocalStorage::load_token(&ctx), None);

        LocalStorage::save_token(&ctx, "abc123\n").unwrap();
        assert_eq!(LocalStorage::load_token(&ctx).as_deref(), Some("abc123"));

        LocalStorage::clear_token(&ctx).unwrap();
        assert_eq!(LocalStorage::load_token(&ctx), None);
    }

    #[test]
    fn test_atomic_write_replaces_contents() {
        let ctx = TestContext::new();
        let path = ctx.get_data_dir().unwrap().join("file.txt");
        LocalStorage::atomic_write(&path, "one").unwrap();
        LocalStorage::atomic_write(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!path.with_extension("tmp").exists());
    }
}
