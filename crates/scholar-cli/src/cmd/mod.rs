//! Command handlers. Each `run_*` takes its parsed args, the resolved
//! [`OutputMode`](crate::output::OutputMode) and the shared [`Project`].

pub mod completions;
pub mod feedback;
pub mod import;
pub mod init;
pub mod recommend;
pub mod reindex;
pub mod search;
pub mod show;
pub mod similar;
pub mod trending;
pub mod user;

use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::Connection;
use scholar_core::config::{ProjectConfig, store_path};
use scholar_core::db::try_open_store;
use scholar_core::error::StoreError;
use scholar_search::semantic::HashEmbedder;

/// Per-process handles: project root and its loaded config.
///
/// Built once in `main` and passed to every handler.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    pub const fn new(root: PathBuf, config: ProjectConfig) -> Self {
        Self { root, config }
    }

    pub fn store_path(&self) -> PathBuf {
        store_path(&self.root)
    }

    /// Open the existing store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotInitialized`] if `scholar init` has not run.
    pub fn open_store(&self) -> Result<Connection> {
        let path = self.store_path();
        try_open_store(&path)?
            .ok_or_else(|| StoreError::NotInitialized(display(&path)).into())
    }

    /// The query/document embedder, or `None` when semantic search is
    /// disabled in config.
    ///
    /// # Errors
    ///
    /// Returns an error if `search.embedding_dim` is zero.
    pub fn embedder(&self) -> Result<Option<HashEmbedder>> {
        if !self.config.search.semantic {
            return Ok(None);
        }
        HashEmbedder::new(self.config.search.embedding_dim).map(Some)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
