use super::JobLifecycle;
use crate::client::StreamAnalyticsApi;
use crate::error::Result;
use crate::models::StartJobParameters;
use crate::operation::cancellation;
use crate::state::ResourceData;
use crate::types::TargetState;
use tracing::{debug, info};

impl<C: StreamAnalyticsApi> JobLifecycle<C> {
    /// Drives the job to the declared run-state, if one is declared. Values other than
    /// `Running` and `Stopped` request nothing.
    pub(super) async fn set_job_state(
        &self,
        d: &ResourceData,
        resource_group: &str,
        job_name: &str,
    ) -> Result<()> {
        let declared = match d.job_state() {
            Some(declared) => declared,
            None => return Ok(()),
        };

        // dropped on every return path, which cancels a transition still in flight
        let (_cancel, signal) = cancellation();

        match TargetState::from_declared(declared) {
            Some(TargetState::Stopped) => {
                info!(%resource_group, %job_name, "stopping streaming job");
                self.client
                    .stop_job(resource_group, job_name, signal)
                    .wait()
                    .await?;
            }
            Some(TargetState::Running) => {
                info!(%resource_group, %job_name, "starting streaming job");
                self.client
                    .start_job(
                        resource_group,
                        job_name,
                        StartJobParameters::default(),
                        signal,
                    )
                    .wait()
                    .await?;
            }
            None => {
                debug!(%declared, "declared job_state requests no transition");
            }
        }
        Ok(())
    }
}
