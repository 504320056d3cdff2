mod children;
mod run_state;

use crate::client::StreamAnalyticsApi;
use crate::error::{Error, Result};
use crate::operation::cancellation;
use crate::resource_id::ResourceId;
use crate::schema::flatten_tags;
use crate::state::ResourceData;
use tracing::{debug, info};

/// Drives a streaming job and its children through create, read, update and delete.
///
/// The management client is handed in at construction and used for every call; nothing here is
/// global. Every call is awaited before the next one is issued.
pub struct JobLifecycle<C> {
    client: C,
}

impl<C: StreamAnalyticsApi> JobLifecycle<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Creates the job, its children, and applies the declared run-state.
    ///
    /// On error `d` may already carry the job id: the job exists remotely and a later `delete`
    /// removes it together with whatever children made it.
    pub async fn create(&self, d: &mut ResourceData) -> Result<()> {
        self.submit(d, true).await
    }

    /// Applies a changed declaration to an existing job.
    ///
    /// A run-state change is applied first. The job and every child are then re-submitted in full;
    /// create-or-replace makes that safe for unchanged children, though it is redundant work.
    pub async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let (resource_group, job_name) = identity(d);
        if d.has_job_state_change() {
            self.set_job_state(d, &resource_group, &job_name).await?;
        }
        self.submit(d, false).await
    }

    /// Refreshes tags and run-state from the remote job. Other attributes are not reconciled.
    pub async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let id: ResourceId = d.id().unwrap_or_default().parse()?;
        let job_name = id.require("streamingjobs")?;
        debug!(resource_group = %id.resource_group, %job_name, "reading streaming job");

        // a job deleted out of band surfaces here as a not-found error, the handle is left alone
        let job = self.client.get_job(&id.resource_group, job_name).await?;

        d.set_tags(flatten_tags(job.tags));
        d.set_job_state(job.properties.and_then(|properties| properties.job_state));
        Ok(())
    }

    /// Deletes the job; the management API removes its children with it.
    pub async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let (resource_group, job_name) = identity(d);
        info!(%resource_group, %job_name, "deleting streaming job");

        let (_cancel, signal) = cancellation();
        self.client
            .delete_job(&resource_group, &job_name, signal)
            .wait()
            .await?;

        d.clear_id();
        Ok(())
    }

    async fn submit(&self, d: &mut ResourceData, apply_run_state: bool) -> Result<()> {
        let (resource_group, job_name) = identity(d);
        let job = d.config().expand_job()?;
        info!(%resource_group, %job_name, "submitting streaming job");

        let (_cancel, signal) = cancellation();
        let submitted = self
            .client
            .create_or_replace_job(job, &resource_group, &job_name, signal)
            .wait()
            .await?;
        let id = submitted.id.ok_or(Error::MissingField("id"))?;

        // Record the id before touching any child. Deleting the job cascades to its children, so
        // with the id in place a failure below can still be cleaned up by a delete.
        d.set_id(id);

        self.set_functions(d, &resource_group, &job_name).await?;
        self.set_inputs(d, &resource_group, &job_name).await?;
        self.set_outputs(d, &resource_group, &job_name).await?;
        self.set_transformation(d, &resource_group, &job_name).await?;

        // last, so a start only happens once the pipeline is defined
        if apply_run_state {
            self.set_job_state(d, &resource_group, &job_name).await?;
        }

        self.read(d).await
    }
}

fn identity(d: &ResourceData) -> (String, String) {
    let config = d.config();
    (config.resource_group_name.clone(), config.name.clone())
}
