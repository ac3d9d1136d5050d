//! Local progress cache
//!
//! When the persistence API is unreachable the tracker keeps working against
//! local state; this file is where that state survives restarts. It also
//! absorbs failed flushes so they can be reconciled on the next open.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::session::ProgressTotals;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedProgress {
    pub totals: ProgressTotals,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocalProgressCache {
    books: HashMap<String, CachedProgress>,
    #[serde(skip)]
    file_path: Option<String>,
}

impl LocalProgressCache {
    pub fn ephemeral() -> Self {
        Self {
            books: HashMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: &str) -> Self {
        Self {
            books: HashMap::new(),
            file_path: Some(file_path.to_string()),
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&str>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load progress cache from {}: {}", path, e);
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let path = Path::new(file_path);
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let mut cache: Self = serde_json::from_str(&content)?;
            cache.file_path = Some(file_path.to_string());
            Ok(cache)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            None => {
                // Ephemeral caches don't save to disk
                Ok(())
            }
        }
    }

    pub fn get(&self, book_id: &str) -> Option<&CachedProgress> {
        self.books.get(book_id)
    }

    pub fn totals(&self, book_id: &str) -> Option<ProgressTotals> {
        self.books.get(book_id).map(|cached| cached.totals)
    }

    pub fn update(&mut self, book_id: &str, totals: ProgressTotals) {
        self.books.insert(
            book_id.to_string(),
            CachedProgress {
                totals,
                last_updated: chrono::Utc::now(),
            },
        );
        if self.file_path.is_some() {
            if let Err(e) = self.save() {
                log::error!("Failed to save progress cache: {}", e);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CachedProgress)> {
        self.books.iter()
    }
}
