//! Flat-file storage implementation for document stores.
//!
//! Every document is a JSON file named after its escaped identifier in a single
//! directory. Writes go to a hidden temporary file first and are renamed into place,
//! so readers never observe a half-written document.

use async_trait::async_trait;
use bson::Document;
use log::{trace, warn};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;

use quarry_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::escape::KeyEscaper;

const EXTENSION: &str = ".json";

/// Directory-backed document storage backend.
///
/// # Example
///
/// ```ignore
/// use quarry_file::FileStore;
/// use quarry_core::backend::StoreBackendBuilder;
///
/// let store = FileStore::builder("./data/orders")
///     .create_dir()
///     .pretty()
///     .build()
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    pretty: bool,
}

impl FileStore {
    /// Creates a builder for a store rooted at `path`.
    pub fn builder(path: impl Into<PathBuf>) -> FileStoreBuilder {
        FileStoreBuilder {
            path: path.into(),
            pretty: false,
            create_dir: false,
        }
    }

    /// Returns the directory holding the documents.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> DocumentStoreResult<PathBuf> {
        if id.is_empty() {
            return Err(DocumentStoreError::InvalidIdentifier(id.to_string()));
        }

        Ok(self.root.join(format!("{}{EXTENSION}", self.escape(id))))
    }

    fn encode(&self, document: &Document) -> DocumentStoreResult<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(document)
        } else {
            serde_json::to_vec(document)
        };

        encoded.map_err(|err| DocumentStoreError::Encode(err.to_string()))
    }
}

fn not_found(id: &str) -> impl FnOnce(std::io::Error) -> DocumentStoreError + '_ {
    move |err| match err.kind() {
        ErrorKind::NotFound => DocumentStoreError::DocumentNotFound(id.to_string()),
        _ => err.into(),
    }
}

#[async_trait]
impl StoreBackend for FileStore {
    async fn read(&self, id: &str) -> DocumentStoreResult<Document> {
        let path = self.path_for(id)?;
        trace!("file read {}", path.display());

        let bytes = fs::read(&path).await.map_err(not_found(id))?;

        serde_json::from_slice(&bytes)
            .map_err(|err| DocumentStoreError::Decode(format!("{}: {err}", path.display())))
    }

    async fn write(&self, id: &str, document: Document) -> DocumentStoreResult<()> {
        let path = self.path_for(id)?;
        let bytes = self.encode(&document)?;
        let staging = self
            .root
            .join(format!(".{}.tmp", self.escape(id)));

        trace!("file write {}", path.display());

        fs::write(&staging, bytes).await?;
        fs::rename(&staging, &path).await?;

        Ok(())
    }

    async fn erase(&self, id: &str) -> DocumentStoreResult<()> {
        let path = self.path_for(id)?;
        trace!("file erase {}", path.display());

        fs::remove_file(&path).await.map_err(not_found(id))
    }

    async fn exist(&self, id: &str) -> DocumentStoreResult<bool> {
        if id.is_empty() {
            return Ok(false);
        }

        Ok(fs::try_exists(self.path_for(id)?).await?)
    }

    async fn index(&self) -> DocumentStoreResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!("skipping non UTF-8 file name {:?} in {}", name, self.root.display());
                continue;
            };

            // Staging files of in-flight writes.
            if name.starts_with('.') {
                continue;
            }

            let Some(key) = name.strip_suffix(EXTENSION) else {
                warn!("skipping stray file {name} in {}", self.root.display());
                continue;
            };

            match self.unescape(key) {
                Ok(id) => ids.push(id),
                Err(err) => warn!("skipping {name} in {}: {err}", self.root.display()),
            }
        }

        ids.sort();

        Ok(ids)
    }

    fn escape(&self, id: &str) -> String {
        KeyEscaper::escape(id)
    }

    fn unescape(&self, key: &str) -> DocumentStoreResult<String> {
        KeyEscaper::unescape(key)
    }
}

/// Builder for constructing [`FileStore`] instances.
#[derive(Debug, Clone)]
pub struct FileStoreBuilder {
    path: PathBuf,
    pretty: bool,
    create_dir: bool,
}

impl FileStoreBuilder {
    /// Writes indented JSON.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Creates the directory (and its parents) if it does not exist.
    pub fn create_dir(mut self) -> Self {
        self.create_dir = true;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for FileStoreBuilder {
    type Backend = FileStore;

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if the directory cannot be
    /// created or the path is not a directory.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let initialization = |err: std::io::Error| {
            DocumentStoreError::Initialization(format!("{}: {err}", self.path.display()))
        };

        if self.create_dir {
            fs::create_dir_all(&self.path)
                .await
                .map_err(initialization)?;
        }

        let metadata = fs::metadata(&self.path)
            .await
            .map_err(initialization)?;

        if !metadata.is_dir() {
            return Err(DocumentStoreError::Initialization(format!(
                "{} is not a directory",
                self.path.display()
            )));
        }

        Ok(FileStore {
            root: self.path,
            pretty: self.pretty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};
    use quarry_core::document::values_equal;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> FileStore {
        FileStore::builder(dir.path()).build().await.unwrap()
    }

    fn same(left: Document, right: Document) -> bool {
        values_equal(&Bson::Document(left), &Bson::Document(right))
    }

    #[tokio::test]
    async fn documents_survive_a_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let document = doc! {
            "name": "widget",
            "price": 2.5,
            "stock": 3,
            "tags": ["a", "b"],
            "dims": { "w": 1, "h": null },
            "active": true,
        };

        store.write("Widget/1", document.clone()).await.unwrap();

        assert!(same(store.read("Widget/1").await.unwrap(), document));
        assert!(dir.path().join("%57idget%2F1.json").exists());
        assert_eq!(store.index().await.unwrap(), vec!["Widget/1"]);
    }

    #[tokio::test]
    async fn missing_documents_are_reported_by_identifier() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        assert_eq!(
            store.read("nope").await,
            Err(DocumentStoreError::DocumentNotFound("nope".into()))
        );
        assert_eq!(
            store.erase("nope").await,
            Err(DocumentStoreError::DocumentNotFound("nope".into()))
        );
        assert!(!store.exist("nope").await.unwrap());
    }

    #[tokio::test]
    async fn writes_replace_and_erase_removes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        store.write("a", doc! { "v": "one" }).await.unwrap();
        store.write("a", doc! { "v": "two" }).await.unwrap();
        assert_eq!(store.read("a").await.unwrap(), doc! { "v": "two" });
        assert!(store.exist("a").await.unwrap());

        store.erase("a").await.unwrap();
        assert!(store.index().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        store.write("kept", doc! {}).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("Bad.json"), "{}").unwrap();
        std::fs::write(dir.path().join(".kept.tmp"), "{}").unwrap();

        assert_eq!(store.index().await.unwrap(), vec!["kept"]);
    }

    #[tokio::test]
    async fn corrupt_files_fail_to_decode() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        assert!(matches!(
            store.read("broken").await,
            Err(DocumentStoreError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn empty_identifiers_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        assert!(matches!(
            store.write("", doc! {}).await,
            Err(DocumentStoreError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn builder_validates_the_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");

        assert!(matches!(
            FileStore::builder(&nested).build().await,
            Err(DocumentStoreError::Initialization(_))
        ));

        let store = FileStore::builder(&nested)
            .create_dir()
            .pretty()
            .build()
            .await
            .unwrap();
        store.write("x", doc! { "k": "v" }).await.unwrap();

        let text = std::fs::read_to_string(nested.join("x.json")).unwrap();
        assert!(text.contains('\n'));

        let file = dir.path().join("plain");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(
            FileStore::builder(&file).build().await,
            Err(DocumentStoreError::Initialization(_))
        ));
    }
}
