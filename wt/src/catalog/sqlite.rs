//! SQLite catalog over wbsstore

use eyre::Context;
use std::path::Path;
use tracing::{debug, info, warn};
use wbsstore::{Filter, IndexValue, Store};

use super::{TemplateAuthoring, TemplateCatalog};
use crate::domain::TemplateSet;
use crate::error::CatalogError;
use crate::graph::validate;

fn store_error(e: eyre::Report) -> CatalogError {
    CatalogError::StoreError(format!("{e:#}"))
}

/// Template catalog persisted as `template_sets` records
pub struct SqliteCatalog {
    store: Store,
}

impl SqliteCatalog {
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        Ok(Self {
            store: Store::open(path).context("Failed to open template catalog")?,
        })
    }

    pub fn in_memory() -> eyre::Result<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
        })
    }

    pub fn from_store(store: Store) -> Self {
        Self { store }
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    /// All versions of a code, ascending
    fn versions(&self, code: &str) -> Result<Vec<TemplateSet>, CatalogError> {
        let mut sets: Vec<TemplateSet> = self
            .store
            .list(&[Filter::eq("code", IndexValue::String(code.to_string()))])
            .map_err(store_error)?;
        sets.sort_by_key(|s| s.version);
        Ok(sets)
    }

    /// Validate `set` as read and publish it unless the stored copy moved on
    fn write_published(&mut self, mut set: TemplateSet, current: u32) -> Result<TemplateSet, CatalogError> {
        validate(&set)?;

        let expected = set.updated_at;
        set.mark_published();
        let written = self.store.update_checked(&set, expected).map_err(store_error)?;
        if !written {
            warn!(code = %set.code, version = set.version, "publish: record changed since it was read");
            return Err(CatalogError::StaleVersion {
                code: set.code,
                requested: set.version,
                current,
            });
        }

        info!(code = %set.code, version = set.version, id = %set.id, "Template published");
        Ok(set)
    }

    fn published(set: TemplateSet) -> Result<TemplateSet, CatalogError> {
        if set.is_published() {
            Ok(set)
        } else {
            Err(CatalogError::NotPublished {
                code: set.code,
                version: set.version,
            })
        }
    }
}

impl TemplateCatalog for SqliteCatalog {
    fn fetch(&self, id: &str, version: u32) -> Result<TemplateSet, CatalogError> {
        debug!(%id, version, "fetch: called");
        let set: TemplateSet = self
            .store
            .get(id)
            .map_err(store_error)?
            .filter(|s: &TemplateSet| s.version == version)
            .ok_or_else(|| CatalogError::NotFound(format!("{id} v{version}")))?;
        Self::published(set)
    }

    fn fetch_by_code(&self, code: &str, version: u32) -> Result<TemplateSet, CatalogError> {
        debug!(%code, version, "fetch_by_code: called");
        Self::published(self.get_version(code, version)?)
    }

    fn fetch_latest(&self, code: &str) -> Result<TemplateSet, CatalogError> {
        debug!(%code, "fetch_latest: called");
        let versions = self.versions(code)?;
        if versions.is_empty() {
            return Err(CatalogError::NotFound(code.to_string()));
        }
        match versions.into_iter().rev().find(|s| s.is_published()) {
            Some(set) => Ok(set),
            None => Err(CatalogError::NotPublished {
                code: code.to_string(),
                version: 0,
            }),
        }
    }

    fn list(&self) -> Result<Vec<TemplateSet>, CatalogError> {
        debug!("list: called");
        let mut sets: Vec<TemplateSet> = self.store.list(&[]).map_err(store_error)?;
        sets.sort_by(|a, b| (&a.code, a.version).cmp(&(&b.code, b.version)));
        Ok(sets)
    }
}

impl TemplateAuthoring for SqliteCatalog {
    fn create_draft(&mut self, mut set: TemplateSet) -> Result<TemplateSet, CatalogError> {
        debug!(code = %set.code, version = set.version, "create_draft: called");
        let versions = self.versions(&set.code)?;
        if versions.iter().any(|s| s.version == set.version) {
            return Err(CatalogError::DuplicateVersion {
                code: set.code,
                version: set.version,
            });
        }
        // Versions only go up
        let current = versions.last().map_or(0, |s| s.version);
        if set.version < current {
            warn!(code = %set.code, version = set.version, current, "create_draft: version below current");
            return Err(CatalogError::StaleVersion {
                code: set.code,
                requested: set.version,
                current,
            });
        }
        if let Some(draft) = versions.iter().find(|s| !s.is_published()) {
            return Err(CatalogError::DraftExists {
                code: set.code,
                version: draft.version,
            });
        }

        // Drafts are never stored as published
        set.is_active = false;
        set.published_at = None;
        self.store.create(&set).map_err(store_error)?;
        info!(code = %set.code, version = set.version, id = %set.id, "Draft created");
        Ok(set)
    }

    fn update_draft(&mut self, mut set: TemplateSet) -> Result<TemplateSet, CatalogError> {
        debug!(code = %set.code, version = set.version, id = %set.id, "update_draft: called");
        let stored: TemplateSet = self
            .store
            .get(&set.id)
            .map_err(store_error)?
            .ok_or_else(|| CatalogError::NotFound(set.id.clone()))?;
        if stored.is_published() {
            return Err(CatalogError::Immutable {
                code: stored.code,
                version: stored.version,
            });
        }
        if (&stored.code, stored.version) != (&set.code, set.version) {
            let versions = self.versions(&set.code)?;
            if versions.iter().any(|s| s.version == set.version) {
                return Err(CatalogError::DuplicateVersion {
                    code: set.code,
                    version: set.version,
                });
            }
            let current = versions.last().map_or(0, |s| s.version);
            if set.version < current {
                return Err(CatalogError::StaleVersion {
                    code: set.code,
                    requested: set.version,
                    current,
                });
            }
        }

        // The caller's copy must carry the stamp it was read with
        let expected = set.updated_at;
        if expected != stored.updated_at {
            warn!(id = %set.id, expected, stored = stored.updated_at, "update_draft: draft changed since it was read");
            return Err(CatalogError::StaleVersion {
                code: set.code,
                requested: set.version,
                current: stored.version,
            });
        }

        set.is_active = false;
        set.published_at = None;
        set.touch();
        let written = self.store.update_checked(&set, expected).map_err(store_error)?;
        if !written {
            warn!(id = %set.id, "update_draft: draft changed during write");
            return Err(CatalogError::StaleVersion {
                code: set.code,
                requested: set.version,
                current: stored.version,
            });
        }
        Ok(set)
    }

    fn publish(&mut self, code: &str, version: u32) -> Result<TemplateSet, CatalogError> {
        debug!(%code, version, "publish: called");
        let versions = self.versions(code)?;
        let current = versions.last().map_or(0, |s| s.version);
        let set = versions
            .into_iter()
            .find(|s| s.version == version)
            .ok_or_else(|| CatalogError::NotFound(format!("{code} v{version}")))?;

        if set.is_published() {
            return Err(CatalogError::AlreadyPublished {
                code: set.code,
                version,
            });
        }
        if current > version {
            warn!(%code, version, current, "publish: target version superseded");
            return Err(CatalogError::StaleVersion {
                code: set.code,
                requested: version,
                current,
            });
        }

        self.write_published(set, current)
    }

    fn new_version(&mut self, code: &str, actor_id: &str) -> Result<TemplateSet, CatalogError> {
        debug!(%code, %actor_id, "new_version: called");
        let latest = self
            .versions(code)?
            .pop()
            .ok_or_else(|| CatalogError::NotFound(code.to_string()))?;
        let draft = latest.revise(actor_id)?;
        self.create_draft(draft)
    }

    fn get_version(&self, code: &str, version: u32) -> Result<TemplateSet, CatalogError> {
        self.versions(code)?
            .into_iter()
            .find(|s| s.version == version)
            .ok_or_else(|| CatalogError::NotFound(format!("{code} v{version}")))
    }
}
