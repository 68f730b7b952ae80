//! Local credential persistence.
//!
//! One string value under a fixed key, written to the user's config
//! directory. The credential survives restarts until explicitly cleared and
//! is never sent anywhere except inside a relay request body.

use anyhow::Result;
use directories::BaseDirs;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Fixed storage key for the provider credential.
pub const CREDENTIAL_KEY: &str = "groq-api-key";

#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    pub fn new(root: PathBuf) -> Self {
        fs::create_dir_all(&root).ok();
        Self { root }
    }

    /// Store rooted in the per-user config directory.
    pub fn open_default() -> Self {
        let root = BaseDirs::new()
            .map(|base| base.config_dir().join("burnish"))
            .unwrap_or_else(|| PathBuf::from(".burnish"));
        Self::new(root)
    }

    /// Throwaway store under a unique temp directory, for tests.
    pub fn in_memory() -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("burnish-{}", Uuid::new_v4()));
        Self::new(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn credential_path(&self) -> PathBuf {
        self.root.join(format!("{CREDENTIAL_KEY}.txt"))
    }

    /// Previously saved credential, if any. Blank files count as absent.
    pub fn load(&self) -> Option<String> {
        let contents = fs::read_to_string(self.credential_path()).ok()?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn save(&self, credential: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.credential_path(), credential.trim())?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.credential_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
