use super::JobLifecycle;
use crate::client::StreamAnalyticsApi;
use crate::error::Result;
use crate::state::ResourceData;
use tracing::trace;

// Child resources carry no local identity. Each declaration is submitted in full, keyed by its
// name, and the first failure ends the pass.
impl<C: StreamAnalyticsApi> JobLifecycle<C> {
    pub(super) async fn set_functions(
        &self,
        d: &ResourceData,
        resource_group: &str,
        job_name: &str,
    ) -> Result<()> {
        for declaration in &d.config().function {
            let function = declaration.expand();
            let result = self
                .client
                .create_or_replace_function(function, resource_group, job_name, &declaration.name)
                .await?;
            trace!(?result, "function submitted");
        }
        Ok(())
    }

    pub(super) async fn set_inputs(
        &self,
        d: &ResourceData,
        resource_group: &str,
        job_name: &str,
    ) -> Result<()> {
        for declaration in &d.config().job_input {
            let input = declaration.expand()?;
            let result = self
                .client
                .create_or_replace_input(input, resource_group, job_name, &declaration.name)
                .await?;
            trace!(?result, "input submitted");
        }
        Ok(())
    }

    pub(super) async fn set_outputs(
        &self,
        d: &ResourceData,
        resource_group: &str,
        job_name: &str,
    ) -> Result<()> {
        for declaration in &d.config().job_output {
            let output = declaration.expand()?;
            let result = self
                .client
                .create_or_replace_output(output, resource_group, job_name, &declaration.name)
                .await?;
            trace!(?result, "output submitted");
        }
        Ok(())
    }

    pub(super) async fn set_transformation(
        &self,
        d: &ResourceData,
        resource_group: &str,
        job_name: &str,
    ) -> Result<()> {
        if let Some(declaration) = &d.config().transformation {
            let transformation = declaration.expand();
            let result = self
                .client
                .create_or_replace_transformation(
                    transformation,
                    resource_group,
                    job_name,
                    &declaration.name,
                )
                .await?;
            trace!(?result, "transformation submitted");
        }
        Ok(())
    }
}
