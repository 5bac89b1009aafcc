use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rdfo_store::{PartStore, StoreConfig, StoreError};
use rdfo_types::{IntoUri, Uri};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{EntityError, EntityResult};
use crate::stored::StoredEntity;

/// Per-store settings written next to the store marker.
pub const STORE_CONFIG_FILE: &str = "rdfo_store.toml";

/// Hands out [`StoredEntity`] handles for one store.
#[derive(Clone)]
pub struct EntityFactory {
    store: Arc<PartStore>,
    log_context: BTreeMap<String, String>,
}

impl EntityFactory {
    pub fn new(store: Arc<PartStore>) -> Self {
        Self {
            store,
            log_context: BTreeMap::new(),
        }
    }

    /// Open a filesystem store as described by `config`.
    pub fn open(config: &StoreConfig) -> EntityResult<Self> {
        Ok(Self::new(Arc::new(PartStore::open(config)?)))
    }

    pub fn in_memory(uri_base: &str) -> EntityResult<Self> {
        Ok(Self::new(Arc::new(PartStore::in_memory(uri_base)?)))
    }

    /// Fields attached to the audit events of every entity handed out.
    pub fn with_log_context(mut self, log_context: BTreeMap<String, String>) -> Self {
        self.log_context = log_context;
        self
    }

    pub fn store(&self) -> &Arc<PartStore> {
        &self.store
    }

    pub fn uri_base(&self) -> &Uri {
        self.store.uri_base()
    }

    /// Load entity `id`, creating it if missing.
    pub fn get_id(&self, id: &str) -> EntityResult<StoredEntity> {
        let entity = StoredEntity::open(self.store.clone(), id, true)?;
        Ok(entity.with_log_context(self.log_context.clone()))
    }

    /// Load the entity named by `uri`, which must sit under this store's
    /// URI base.
    pub fn get(&self, uri: impl IntoUri) -> EntityResult<StoredEntity> {
        let id = self.id_of(uri)?;
        self.get_id(&id)
    }

    pub fn exists(&self, id: &str) -> EntityResult<bool> {
        Ok(self.store.exists(id)?)
    }

    pub fn delete_id(&self, id: &str) -> EntityResult<()> {
        Ok(self.store.delete_object(id)?)
    }

    pub fn delete(&self, uri: impl IntoUri) -> EntityResult<()> {
        let id = self.id_of(uri)?;
        self.delete_id(&id)
    }

    pub fn list_ids(&self) -> EntityResult<Vec<String>> {
        Ok(self.store.list_ids()?)
    }

    fn id_of(&self, uri: impl IntoUri) -> EntityResult<String> {
        let uri = uri.into_uri(self.store.registry())?;
        let base = self.uri_base();
        match uri.strip_prefix(base.as_str()) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(EntityError::UriOutsideStore {
                uri: uri.to_string(),
                uri_base: base.to_string(),
            }),
        }
    }
}

impl fmt::Debug for EntityFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityFactory")
            .field("uri_base", &self.store.uri_base().as_str())
            .field("prefix", &self.store.prefix())
            .finish()
    }
}

/// A directory of named stores, one subdirectory each.
///
/// Subdirectories that are not stores are remembered with status `false`
/// and are never modified or deleted.
pub struct StoreRegistry {
    root: PathBuf,
    template: StoreConfig,
    stores: BTreeMap<String, EntityFactory>,
    status: BTreeMap<String, bool>,
}

impl StoreRegistry {
    /// Open every store found under `root`, creating `root` if needed.
    ///
    /// New stores take their settings from `template`, with `storage_dir`
    /// replaced by the store's own directory.
    pub fn open(root: impl Into<PathBuf>, template: StoreConfig) -> EntityResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let mut registry = Self {
            root,
            template,
            stores: BTreeMap::new(),
            status: BTreeMap::new(),
        };

        let subdirs: Vec<String> = WalkDir::new(&registry.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        for name in subdirs {
            match registry.open_existing(&name) {
                Ok(factory) => {
                    registry.stores.insert(name.clone(), factory);
                    registry.status.insert(name, true);
                }
                Err(e) => {
                    warn!(store = %name, error = %e, "directory is not a usable store");
                    registry.status.insert(name, false);
                }
            }
        }
        info!(
            root = %registry.root.display(),
            stores = registry.stores.len(),
            "opened store registry"
        );
        Ok(registry)
    }

    /// Leading ASCII letter followed by letters and digits; anything after
    /// the first other character is dropped.
    pub fn sanitise(name: &str) -> EntityResult<String> {
        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(EntityError::InvalidStoreName(name.to_string()));
        }
        let end = name
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(name.len());
        Ok(name[..end].to_string())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// `Some(true)` for an open store, `Some(false)` for a directory that
    /// is not one, `None` if unknown.
    pub fn status(&self, name: &str) -> Option<bool> {
        let name = Self::sanitise(name).ok()?;
        self.status.get(&name).copied()
    }

    pub fn get_store(&self, name: &str) -> EntityResult<&EntityFactory> {
        let name = Self::sanitise(name)?;
        self.stores.get(&name).ok_or(EntityError::StoreNotFound(name))
    }

    /// Create store `name`, or return it if it is already open. With
    /// `refresh`, an open store is reopened from disk first.
    pub fn add_store(&mut self, name: &str, uri_base: Option<&str>, refresh: bool) -> EntityResult<&EntityFactory> {
        let name = Self::sanitise(name)?;
        if self.stores.contains_key(&name) && !refresh {
            return self.get_store(&name);
        }
        if self.status.get(&name) == Some(&false) {
            return Err(StoreError::NotAStore(self.root.join(&name)).into());
        }
        let dir = self.root.join(&name);
        let factory = if dir.join(STORE_CONFIG_FILE).is_file() {
            self.open_existing(&name)?
        } else {
            let mut config = self.template.clone().with_storage_dir(&dir);
            if let Some(base) = uri_base {
                config.uri_base = base.to_string();
            }
            let factory = EntityFactory::open(&config)?;
            fs::write(dir.join(STORE_CONFIG_FILE), config.to_toml_string()?)?;
            info!(store = %name, uri_base = %factory.uri_base(), "created store");
            factory
        };
        self.stores.insert(name.clone(), factory);
        self.status.insert(name.clone(), true);
        self.get_store(&name)
    }

    /// Remove a store and everything in it.
    pub fn delete_store(&mut self, name: &str) -> EntityResult<()> {
        let name = Self::sanitise(name)?;
        if self.status.get(&name) != Some(&true) {
            return Err(EntityError::StoreNotFound(name));
        }
        let dir = self.root.join(&name);
        if dir.is_dir() {
            fs::remove_dir_all(&dir)?;
        }
        self.stores.remove(&name);
        self.status.remove(&name);
        info!(store = %name, "deleted store");
        Ok(())
    }

    /// Copy store `from` into a new store `to`. The copy keeps the source's
    /// settings, including its URI base.
    pub fn clone_store(&mut self, from: &str, to: &str) -> EntityResult<&EntityFactory> {
        let from = Self::sanitise(from)?;
        let to = Self::sanitise(to)?;
        if self.status.get(&from) != Some(&true) {
            return Err(EntityError::StoreNotFound(from));
        }
        let target = self.root.join(&to);
        if self.status.contains_key(&to) || target.exists() {
            return Err(EntityError::StoreAlreadyExists(to));
        }
        let source = self.root.join(&from);
        copy_tree(&source, &target)?;
        rebase_settings(&source, &target)?;
        let factory = self.open_existing(&to)?;
        self.stores.insert(to.clone(), factory);
        self.status.insert(to.clone(), true);
        info!(from = %from, to = %to, "cloned store");
        self.get_store(&to)
    }

    pub fn list_ids(&self, name: &str) -> EntityResult<Vec<String>> {
        self.get_store(name)?.list_ids()
    }

    pub fn get_id(&self, id: &str, store: &str) -> EntityResult<StoredEntity> {
        self.get_store(store)?.get_id(id)
    }

    fn open_existing(&self, name: &str) -> EntityResult<EntityFactory> {
        let dir = self.root.join(name);
        let settings = dir.join(STORE_CONFIG_FILE);
        let config = if settings.is_file() {
            StoreConfig::load(&settings)?.with_storage_dir(&dir)
        } else {
            self.template.clone().with_storage_dir(&dir)
        };
        debug!(store = %name, dir = %dir.display(), "opening store");
        EntityFactory::open(&config)
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("root", &self.root)
            .field("status", &self.status)
            .finish()
    }
}

/// Point a copied store's settings at its new directory. An audit log
/// inside the source store moves with it; one elsewhere is dropped so two
/// stores never append to the same file.
fn rebase_settings(source: &Path, target: &Path) -> EntityResult<()> {
    let settings = target.join(STORE_CONFIG_FILE);
    if !settings.is_file() {
        return Ok(());
    }
    let mut config = StoreConfig::load(&settings)?.with_storage_dir(target);
    config.audit_log = config
        .audit_log
        .as_deref()
        .and_then(|p| p.strip_prefix(source).ok())
        .map(|rel| target.join(rel));
    fs::write(&settings, config.to_toml_string()?)?;
    Ok(())
}

fn copy_tree(source: &Path, target: &Path) -> EntityResult<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| EntityError::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| EntityError::Io(std::io::Error::other(e)))?;
        let dest = target.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
