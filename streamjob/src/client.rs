mod arm;
#[cfg(any(test, feature = "fake"))]
mod fake;

pub use arm::{ArmClient, ArmConfig, DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
#[cfg(any(test, feature = "fake"))]
pub use fake::{Call, FakeStreamAnalytics};

use crate::error::Result;
use crate::models::{Function, Input, Output, StartJobParameters, StreamingJob, Transformation};
use crate::operation::{CancelSignal, Operation};
use async_trait::async_trait;

/// The slice of the Stream Analytics management API the job lifecycle drives.
///
/// Operations that ARM runs asynchronously (job create-or-replace, delete, start and stop) hand
/// back an [`Operation`] bound to the caller's cancellation signal. Child resources and reads are
/// plain request/response calls. Every child call uses create-or-replace semantics, so submitting
/// the same declaration twice is harmless.
#[async_trait]
pub trait StreamAnalyticsApi: Send + Sync {
    fn create_or_replace_job(
        &self,
        job: StreamingJob,
        resource_group: &str,
        job_name: &str,
        cancel: CancelSignal,
    ) -> Operation<StreamingJob>;

    async fn get_job(&self, resource_group: &str, job_name: &str) -> Result<StreamingJob>;

    fn delete_job(&self, resource_group: &str, job_name: &str, cancel: CancelSignal)
        -> Operation<()>;

    fn start_job(
        &self,
        resource_group: &str,
        job_name: &str,
        parameters: StartJobParameters,
        cancel: CancelSignal,
    ) -> Operation<()>;

    fn stop_job(&self, resource_group: &str, job_name: &str, cancel: CancelSignal) -> Operation<()>;

    async fn create_or_replace_function(
        &self,
        function: Function,
        resource_group: &str,
        job_name: &str,
        function_name: &str,
    ) -> Result<Function>;

    async fn create_or_replace_input(
        &self,
        input: Input,
        resource_group: &str,
        job_name: &str,
        input_name: &str,
    ) -> Result<Input>;

    async fn create_or_replace_output(
        &self,
        output: Output,
        resource_group: &str,
        job_name: &str,
        output_name: &str,
    ) -> Result<Output>;

    async fn create_or_replace_transformation(
        &self,
        transformation: Transformation,
        resource_group: &str,
        job_name: &str,
        transformation_name: &str,
    ) -> Result<Transformation>;
}
