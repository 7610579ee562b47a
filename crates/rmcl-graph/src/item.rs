//! The polymorphic tree node, realized as an enum rather than a
//! trait-object hierarchy — the only polymorphic call sites are the
//! filesystem surface's type-dispatching branches, and an enum avoids the
//! heap churn a `Box<dyn Item>` tree would need.

use std::sync::Mutex as StdMutex;

use chrono::{DateTime, Utc};
use rmcl_api::ApiClient;
use rmcl_cache::{DataCache, DocumentCache};
use rmcl_core::domain::{FileType, RemoteItemType, RemoteMetadata, MODE_FILE_NAME, MODE_ID};
use rmcl_zip::LocalFileEntry;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::GraphError;

/// Placeholder body for `contents()` when the archive has no entry matching
/// the document's expected extension.
const UNABLE_TO_LOAD_CONTENTS: &[u8] = b"Unable to load file contents";

/// Mutable lazily-populated fields of a [`Document`], guarded by a single
/// `tokio::sync::Mutex`: every public accessor locks it for the
/// duration of its own work and calls the `*_locked` inner function for any
/// sub-computation, rather than re-entering the lock.
#[derive(Debug, Default)]
pub struct DocumentLazyState {
    pub blob_url_get: Option<String>,
    pub blob_url_get_expires: Option<DateTime<Utc>>,
    pub file_type: Option<FileType>,
    pub size: Option<u64>,
    pub raw_size: Option<u64>,
}

/// A file-like leaf backed by remote metadata.
#[derive(Debug)]
pub struct Document {
    pub id: String,
    pub parent: String,
    pub name: String,
    pub version: i64,
    pub mtime: DateTime<Utc>,
    pub metadata: Map<String, Value>,
    lazy: AsyncMutex<DocumentLazyState>,
}

/// A container backed by remote metadata.
#[derive(Debug)]
pub struct Folder {
    pub id: String,
    pub parent: String,
    pub name: String,
    pub version: i64,
    pub mtime: DateTime<Utc>,
    pub metadata: Map<String, Value>,
    pub children: StdMutex<Vec<String>>,
}

/// A synthetic folder not backed by remote metadata: the root or trash.
#[derive(Debug)]
pub struct VirtualFolder {
    pub id: String,
    pub parent: Option<String>,
    pub name: String,
    pub children: StdMutex<Vec<String>>,
}

/// The synthetic `.mode` control file.
#[derive(Debug)]
pub struct ModeFile {
    pub id: String,
    pub name: String,
}

impl ModeFile {
    pub fn singleton() -> Self {
        ModeFile {
            id: MODE_ID.to_string(),
            name: MODE_FILE_NAME.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum Item {
    Document(Document),
    Folder(Folder),
    VirtualFolder(VirtualFolder),
    ModeFile(ModeFile),
}

impl Item {
    pub fn id(&self) -> &str {
        match self {
            Item::Document(d) => &d.id,
            Item::Folder(f) => &f.id,
            Item::VirtualFolder(v) => &v.id,
            Item::ModeFile(m) => &m.id,
        }
    }

    pub fn parent(&self) -> Option<&str> {
        match self {
            Item::Document(d) => Some(&d.parent),
            Item::Folder(f) => Some(&f.parent),
            Item::VirtualFolder(v) => v.parent.as_deref(),
            Item::ModeFile(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Item::Document(d) => &d.name,
            Item::Folder(f) => &f.name,
            Item::VirtualFolder(v) => &v.name,
            Item::ModeFile(m) => &m.name,
        }
    }

    pub fn version(&self) -> Option<i64> {
        match self {
            Item::Document(d) => Some(d.version),
            Item::Folder(f) => Some(f.version),
            Item::VirtualFolder(_) | Item::ModeFile(_) => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Item::Folder(_) | Item::VirtualFolder(_))
    }

    /// The modification time reported through `getattr`. Virtual items and
    /// the mode file have no remote timestamp, so they report the time the
    /// graph itself started.
    pub fn mtime(&self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Item::Document(d) => d.mtime,
            Item::Folder(f) => f.mtime,
            Item::VirtualFolder(_) | Item::ModeFile(_) => started_at,
        }
    }

    /// A snapshot of this item's children, or an empty vec for leaves.
    pub fn children(&self) -> Vec<String> {
        match self {
            Item::Folder(f) => f.children.lock().expect("children mutex poisoned").clone(),
            Item::VirtualFolder(v) => v.children.lock().expect("children mutex poisoned").clone(),
            Item::Document(_) | Item::ModeFile(_) => Vec::new(),
        }
    }

    pub fn push_child(&self, id: String) {
        match self {
            Item::Folder(f) => f.children.lock().expect("children mutex poisoned").push(id),
            Item::VirtualFolder(v) => v.children.lock().expect("children mutex poisoned").push(id),
            Item::Document(_) | Item::ModeFile(_) => {}
        }
    }

    pub fn clear_children(&self) {
        match self {
            Item::Folder(f) => f.children.lock().expect("children mutex poisoned").clear(),
            Item::VirtualFolder(v) => v.children.lock().expect("children mutex poisoned").clear(),
            Item::Document(_) | Item::ModeFile(_) => {}
        }
    }

    /// Builds a new root [`VirtualFolder`].
    pub fn new_root() -> Item {
        Item::VirtualFolder(VirtualFolder {
            id: rmcl_core::domain::ROOT_ID.to_string(),
            parent: None,
            name: String::new(),
            children: StdMutex::new(Vec::new()),
        })
    }

    /// Builds a new trash [`VirtualFolder`], parented to root.
    pub fn new_trash() -> Item {
        Item::VirtualFolder(VirtualFolder {
            id: rmcl_core::domain::TRASH_ID.to_string(),
            parent: Some(rmcl_core::domain::ROOT_ID.to_string()),
            name: "trash".to_string(),
            children: StdMutex::new(Vec::new()),
        })
    }

    /// Builds the mode file singleton.
    pub fn new_mode_file() -> Item {
        Item::ModeFile(ModeFile::singleton())
    }

    /// Constructs an [`Item`] from a remote metadata entry.
    ///
    /// `metadata` holds the full wire object (ID, Version, VissibleName,
    /// Parent, ModifiedClient, BlobURL*, plus any unmodeled fields), not
    /// just the serde-flatten leftover, so a `meta`-mode read dumps the
    /// complete object the remote sent rather than an empty map.
    pub fn from_metadata(meta: RemoteMetadata) -> Item {
        let metadata = match serde_json::to_value(&meta) {
            Ok(Value::Object(map)) => map,
            _ => meta.extra.clone(),
        };
        match meta.item_type {
            RemoteItemType::CollectionType => Item::Folder(Folder {
                id: meta.id,
                parent: meta.parent,
                name: meta.visible_name,
                version: meta.version,
                mtime: meta.modified_client.unwrap_or_else(rmcl_core::time::now),
                metadata,
                children: StdMutex::new(Vec::new()),
            }),
            RemoteItemType::DocumentType => Item::Document(Document {
                id: meta.id,
                parent: meta.parent,
                name: meta.visible_name,
                version: meta.version,
                mtime: meta.modified_client.unwrap_or_else(rmcl_core::time::now),
                metadata,
                lazy: AsyncMutex::new(DocumentLazyState {
                    blob_url_get: meta.blob_url_get,
                    blob_url_get_expires: meta.blob_url_get_expires,
                    ..Default::default()
                }),
            }),
        }
    }
}

impl Document {
    /// Returns the current signed download URL, renewing it if expired.
    pub async fn download_url(&self, api: &ApiClient) -> Result<Option<String>, GraphError> {
        let mut state = self.lazy.lock().await;
        Self::download_url_locked(&self.id, &mut state, api).await
    }

    async fn download_url_locked(
        id: &str,
        state: &mut DocumentLazyState,
        api: &ApiClient,
    ) -> Result<Option<String>, GraphError> {
        if let (Some(url), Some(expires)) = (&state.blob_url_get, state.blob_url_get_expires) {
            if expires > rmcl_core::time::now() {
                return Ok(Some(url.clone()));
            }
        }

        let meta = api.get_metadata(id, true).await?;
        state.blob_url_get = meta.blob_url_get.clone();
        state.blob_url_get_expires = meta.blob_url_get_expires;
        Ok(meta.blob_url_get)
    }

    /// Returns the raw cloud blob, downloading and caching it in memory on
    /// first use. Not persisted to `DataCache` — the blob can be multiple
    /// megabytes, far past what that store is sized for.
    pub async fn raw(
        &self,
        api: &ApiClient,
        document_cache: &DocumentCache,
    ) -> Result<Vec<u8>, GraphError> {
        let mut state = self.lazy.lock().await;
        let cache_key = format!("{}:{}:raw", self.id, self.version);
        if let Some(cached) = document_cache.get(&cache_key) {
            return Ok(cached);
        }

        let url = Self::download_url_locked(&self.id, &mut state, api)
            .await?
            .unwrap_or_default();
        let bytes = api.get_blob(&url).await?;
        document_cache.set(cache_key, bytes.clone());
        Ok(bytes)
    }

    /// Returns the size in bytes of the raw cloud blob.
    pub async fn raw_size(
        &self,
        api: &ApiClient,
        data_cache: &DataCache,
    ) -> Result<u64, GraphError> {
        let mut state = self.lazy.lock().await;
        Self::raw_size_locked(&self.id, self.version, &mut state, api, data_cache).await
    }

    async fn raw_size_locked(
        id: &str,
        version: i64,
        state: &mut DocumentLazyState,
        api: &ApiClient,
        data_cache: &DataCache,
    ) -> Result<u64, GraphError> {
        if let Some(size) = state.raw_size {
            return Ok(size);
        }
        if let Some(cached) = data_cache.get_property(id, version, "raw_size").await? {
            if let Ok(size) = std::str::from_utf8(&cached).unwrap_or("").parse::<u64>() {
                state.raw_size = Some(size);
                return Ok(size);
            }
        }

        let url = Self::download_url_locked(id, state, api)
            .await?
            .unwrap_or_default();
        let size = api.get_blob_size(&url).await?;
        state.raw_size = Some(size);
        data_cache
            .set_property(id, version, "raw_size", size.to_string().as_bytes())
            .await?;
        Ok(size)
    }

    /// Resolves and caches the inner file type and decoded size.
    async fn get_details_locked(
        id: &str,
        version: i64,
        state: &mut DocumentLazyState,
        api: &ApiClient,
        data_cache: &DataCache,
    ) -> Result<(FileType, Option<u64>), GraphError> {
        if let Some(file_type) = state.file_type {
            return Ok((file_type, state.size));
        }

        let url = Self::download_url_locked(id, state, api)
            .await?
            .unwrap_or_default();
        let (file_type, inner_size) = api.get_file_details(&url).await?;
        let size = match inner_size {
            Some(size) => size,
            None => Self::raw_size_locked(id, version, state, api, data_cache).await?,
        };

        state.size = Some(size);
        data_cache
            .set_property(id, version, "size", size.to_string().as_bytes())
            .await?;
        if file_type != FileType::Unknown {
            state.file_type = Some(file_type);
            data_cache
                .set_property(id, version, "type", file_type.to_string().as_bytes())
                .await?;
        }
        Ok((file_type, Some(size)))
    }

    /// Returns the inner file type, probing the remote if not yet known.
    pub async fn file_type(
        &self,
        api: &ApiClient,
        data_cache: &DataCache,
    ) -> Result<FileType, GraphError> {
        let mut state = self.lazy.lock().await;
        let (file_type, _) =
            Self::get_details_locked(&self.id, self.version, &mut state, api, data_cache).await?;
        Ok(file_type)
    }

    /// Returns the decoded size of the inner file.
    pub async fn size(&self, api: &ApiClient, data_cache: &DataCache) -> Result<u64, GraphError> {
        let mut state = self.lazy.lock().await;
        let (_, size) =
            Self::get_details_locked(&self.id, self.version, &mut state, api, data_cache).await?;
        Ok(size.unwrap_or(0))
    }

    /// The decoded inner file for `pdf`/`epub` documents,
    /// the raw blob for `notes`/`unknown`.
    pub async fn contents(
        &self,
        api: &ApiClient,
        data_cache: &DataCache,
        document_cache: &DocumentCache,
    ) -> Result<Vec<u8>, GraphError> {
        let cache_key = format!("{}:{}:orig", self.id, self.version);
        if let Some(cached) = document_cache.get(&cache_key) {
            return Ok(cached);
        }

        let file_type = self.file_type(api, data_cache).await?;
        let raw = self.raw(api, document_cache).await?;
        let Some(extension) = file_type.extension() else {
            return Ok(raw);
        };

        let mut cursor = std::io::Cursor::new(&raw);
        while let Some(entry) = LocalFileEntry::read_next(&mut cursor)? {
            if entry.filename.ends_with(extension) {
                let contents = entry.contents.unwrap_or_default();
                document_cache.set(cache_key, contents.clone());
                return Ok(contents);
            }
        }
        document_cache.set(cache_key, UNABLE_TO_LOAD_CONTENTS.to_vec());
        Ok(UNABLE_TO_LOAD_CONTENTS.to_vec())
    }
}
