use crate::schema::JobConfiguration;
use crate::types::Tags;
use serde::{Deserialize, Serialize};

/// Local view of one streaming job resource: the declared configuration plus the remote handle.
///
/// This is what gets persisted between operations. The handle is set as soon as the job itself
/// exists remotely and cleared only by a successful delete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    config: JobConfiguration,
    #[serde(skip)]
    prior: Option<Box<JobConfiguration>>,
}

impl ResourceData {
    /// State for a resource that does not exist yet.
    pub fn new(config: JobConfiguration) -> Self {
        Self {
            id: None,
            config,
            prior: None,
        }
    }

    /// State for applying `config` on top of previously persisted state.
    ///
    /// `job_state` is computed: when the new declaration leaves it out, the prior value is kept.
    pub fn planned(mut config: JobConfiguration, prior: ResourceData) -> Self {
        if config.job_state.is_none() {
            config.job_state = prior.config.job_state.clone();
        }
        Self {
            id: prior.id,
            config,
            prior: Some(Box::new(prior.config)),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn config(&self) -> &JobConfiguration {
        &self.config
    }

    pub fn job_state(&self) -> Option<&str> {
        self.config.job_state.as_deref()
    }

    pub fn set_job_state(&mut self, job_state: Option<String>) {
        self.config.job_state = job_state;
    }

    pub fn tags(&self) -> &Tags {
        &self.config.tags
    }

    pub fn set_tags(&mut self, tags: Tags) {
        self.config.tags = tags;
    }

    pub fn has_job_state_change(&self) -> bool {
        match &self.prior {
            Some(prior) => prior.job_state != self.config.job_state,
            None => self.config.job_state.is_some(),
        }
    }
}
