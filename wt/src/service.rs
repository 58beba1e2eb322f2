//! Exposed operations bound to a catalog

use chrono::NaiveDate;
use tracing::debug;

use crate::catalog::TemplateCatalog;
use crate::config::Config;
use crate::domain::{ClosurePolicy, Selection, TemplateSet};
use crate::error::WbsError;
use crate::graph::validate;
use crate::instantiate::{
    Clock, InstantiationRequest, InstantiationSummary, ProjectTaskStore, RoleResolver, SystemClock, instantiate,
};
use crate::projection::{Projection, project_selection};

/// Which published set to project, and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionQuery {
    pub code: String,
    /// Latest published version when None
    pub version: Option<u32>,
    pub selection: Selection,
    /// Service default when None
    pub policy: Option<ClosurePolicy>,
}

impl ProjectionQuery {
    pub fn new(code: impl Into<String>, selection: Selection) -> Self {
        Self {
            code: code.into(),
            version: None,
            selection,
            policy: None,
        }
    }

    pub fn with_version(mut self, version: Option<u32>) -> Self {
        self.version = version;
        self
    }

    pub fn with_policy(mut self, policy: Option<ClosurePolicy>) -> Self {
        self.policy = policy;
        self
    }
}

/// Validate, preview and instantiate templates held by a catalog
pub struct TemplateService<C> {
    catalog: C,
    default_policy: ClosurePolicy,
    clock: Box<dyn Clock>,
}

impl<C: TemplateCatalog> TemplateService<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            default_policy: ClosurePolicy::default(),
            clock: Box::new(SystemClock),
        }
    }

    /// Service using the configured default closure policy
    pub fn from_config(catalog: C, config: &Config) -> Self {
        Self::new(catalog).with_default_policy(config.projection.default_policy)
    }

    pub fn with_default_policy(mut self, policy: ClosurePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    pub fn default_policy(&self) -> ClosurePolicy {
        self.default_policy
    }

    /// Structural validation of any set, stored or not
    pub fn validate_template(&self, set: &TemplateSet) -> Result<(), WbsError> {
        validate(set)?;
        Ok(())
    }

    /// Published set by code; latest version when `version` is None
    pub fn published(&self, code: &str, version: Option<u32>) -> Result<TemplateSet, WbsError> {
        let set = match version {
            Some(version) => self.catalog.fetch_by_code(code, version)?,
            None => self.catalog.fetch_latest(code)?,
        };
        Ok(set)
    }

    /// Side-effect free projection of a published set
    pub fn preview_projection(&self, query: &ProjectionQuery) -> Result<Projection, WbsError> {
        let policy = query.policy.unwrap_or(self.default_policy);
        debug!(
            code = %query.code,
            version = ?query.version,
            selection = ?query.selection,
            %policy,
            "preview_projection: called"
        );
        let set = self.published(&query.code, query.version)?;
        Ok(project_selection(&set, &query.selection, policy)?)
    }

    /// Request for `project_id` starting on `start_date`, or today by the service clock
    pub fn request(
        &self,
        project_id: impl Into<String>,
        start_date: Option<NaiveDate>,
        actor_id: impl Into<String>,
    ) -> InstantiationRequest {
        InstantiationRequest::new(project_id, start_date.unwrap_or_else(|| self.clock.today()), actor_id)
    }

    /// Project a published set and write it into a project as one batch
    pub fn instantiate(
        &self,
        query: &ProjectionQuery,
        request: &InstantiationRequest,
        roles: &dyn RoleResolver,
        store: &mut dyn ProjectTaskStore,
    ) -> Result<InstantiationSummary, WbsError> {
        debug!(code = %query.code, version = ?query.version, project_id = %request.project_id, "instantiate: called");
        let projection = self.preview_projection(query)?;
        Ok(instantiate(&projection, request, roles, store)?)
    }
}
