//! Versioned template storage
//!
//! Reading ([`TemplateCatalog`]) only ever hands out published, validated,
//! immutable sets. Writing ([`TemplateAuthoring`]) manages drafts and the
//! publish transition, which is the only shared mutable state in the system.

mod sqlite;

pub use sqlite::SqliteCatalog;

use crate::domain::TemplateSet;
use crate::error::CatalogError;

/// Read side of the catalog
pub trait TemplateCatalog {
    /// Published set with this id; `version` must match the stored one
    fn fetch(&self, id: &str, version: u32) -> Result<TemplateSet, CatalogError>;

    /// Published set by (code, version)
    fn fetch_by_code(&self, code: &str, version: u32) -> Result<TemplateSet, CatalogError>;

    /// Highest published version of a code
    fn fetch_latest(&self, code: &str) -> Result<TemplateSet, CatalogError>;

    /// Every stored set, drafts included, ordered by (code, version)
    fn list(&self) -> Result<Vec<TemplateSet>, CatalogError>;
}

/// Write side of the catalog
pub trait TemplateAuthoring: TemplateCatalog {
    /// Store a new draft
    ///
    /// Fails with `DuplicateVersion` if (code, version) exists and with
    /// `DraftExists` if the code already has an unpublished version.
    fn create_draft(&mut self, set: TemplateSet) -> Result<TemplateSet, CatalogError>;

    /// Replace a stored draft; published sets are `Immutable`
    fn update_draft(&mut self, set: TemplateSet) -> Result<TemplateSet, CatalogError>;

    /// Validate and publish (code, version)
    fn publish(&mut self, code: &str, version: u32) -> Result<TemplateSet, CatalogError>;

    /// Copy the highest version of `code` into a new draft one version up
    fn new_version(&mut self, code: &str, actor_id: &str) -> Result<TemplateSet, CatalogError>;

    /// Any stored version, published or not
    fn get_version(&self, code: &str, version: u32) -> Result<TemplateSet, CatalogError>;
}
