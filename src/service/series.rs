use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::series::{validate_series_id, SeriesDefinition, SeriesFile};
use crate::storage::PersistenceAdapter;

/// In-memory registry of series definitions, written through to the store.
///
/// Mutations hold the registry write lock across the store call, so two
/// concurrent creates of one id settle on a single definition.
pub struct SeriesService {
    store: Arc<dyn PersistenceAdapter>,
    registry: RwLock<BTreeMap<String, Arc<SeriesFile>>>,
}

impl SeriesService {
    /// Loads every series the store knows about.
    pub fn load(store: Arc<dyn PersistenceAdapter>) -> Result<Self> {
        let registry: BTreeMap<_, _> = store
            .list_series()?
            .into_iter()
            .map(|file| (file.id().to_string(), Arc::new(file)))
            .collect();
        log::info!("loaded {} series", registry.len());
        Ok(Self {
            store,
            registry: RwLock::new(registry),
        })
    }

    pub fn store(&self) -> &Arc<dyn PersistenceAdapter> {
        &self.store
    }

    pub fn is_read_only(&self) -> bool {
        self.store.is_read_only()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    /// Creates a series, or returns it unchanged if an identical definition exists.
    pub fn create(&self, definition: SeriesDefinition) -> Result<Arc<SeriesFile>> {
        definition.validate()?;
        self.ensure_writable()?;
        let mut registry = self.registry.write();
        if let Some(existing) = registry.get(&definition.id) {
            if existing.definition == definition {
                return Ok(existing.clone());
            }
            return Err(Error::SeriesConflict(definition.id));
        }
        let file = SeriesFile::new(definition);
        self.store.save_series(&file)?;
        log::info!(
            "created series {} ({}, {}ms, {})",
            file.id(),
            file.definition.number_type,
            file.definition.interval,
            file.definition.partition
        );
        let file = Arc::new(file);
        registry.insert(file.id().to_string(), file.clone());
        Ok(file)
    }

    pub fn get(&self, id: &str) -> Result<Arc<SeriesFile>> {
        self.registry
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SeriesNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.read().contains_key(id)
    }

    /// All series ordered by id.
    pub fn list(&self) -> Vec<Arc<SeriesFile>> {
        self.registry.read().values().cloned().collect()
    }

    /// Replaces the metadata map of a series; the definition is untouched.
    pub fn update_metadata(
        &self,
        id: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<Arc<SeriesFile>> {
        validate_series_id(id)?;
        self.ensure_writable()?;
        let mut registry = self.registry.write();
        let current = registry
            .get(id)
            .ok_or_else(|| Error::SeriesNotFound(id.to_string()))?;
        let mut file = SeriesFile::clone(current);
        file.metadata = metadata;
        self.store.save_series(&file)?;
        let file = Arc::new(file);
        registry.insert(id.to_string(), file.clone());
        Ok(file)
    }

    /// Removes a series and all of its partitions.
    pub fn delete(&self, id: &str) -> Result<()> {
        validate_series_id(id)?;
        self.ensure_writable()?;
        let mut registry = self.registry.write();
        if !registry.contains_key(id) {
            return Err(Error::SeriesNotFound(id.to_string()));
        }
        self.store.delete_series(id)?;
        registry.remove(id);
        log::info!("deleted series {id}");
        Ok(())
    }
}
