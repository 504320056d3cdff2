//! In-memory Stream Analytics used by tests.
//!
//! Every call is recorded in order before it is answered, so tests can assert exact call
//! sequences. Failures are injected per call with `fail_on` and stay armed until cleared.

use super::StreamAnalyticsApi;
use crate::error::{Error, Result};
use crate::models::{Function, Input, Output, StartJobParameters, StreamingJob, Transformation};
use crate::operation::{CancelSignal, Operation};
use crate::resource_id::streaming_job_id;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Call {
    CreateOrReplaceJob(String),
    GetJob(String),
    DeleteJob(String),
    StartJob(String),
    StopJob(String),
    CreateOrReplaceFunction(String),
    CreateOrReplaceInput(String),
    CreateOrReplaceOutput(String),
    CreateOrReplaceTransformation(String),
}

impl Call {
    pub fn is_run_state_transition(&self) -> bool {
        matches!(self, Call::StartJob(_) | Call::StopJob(_))
    }
}

#[derive(Clone, Debug)]
struct Failure {
    status: u16,
    code: String,
    message: String,
}

#[derive(Default)]
struct RemoteJob {
    job: StreamingJob,
    functions: BTreeMap<String, Function>,
    inputs: BTreeMap<String, Input>,
    outputs: BTreeMap<String, Output>,
    transformation: Option<Transformation>,
}

impl RemoteJob {
    fn set_job_state(&mut self, state: &str) {
        if let Some(properties) = self.job.properties.as_mut() {
            properties.job_state = Some(state.to_string());
        }
    }
}

#[derive(Default)]
struct FakeState {
    jobs: HashMap<(String, String), RemoteJob>,
    calls: Vec<Call>,
    failures: HashMap<Call, Failure>,
}

#[derive(Clone)]
pub struct FakeStreamAnalytics {
    subscription_id: String,
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeStreamAnalytics {
    fn default() -> Self {
        Self::new("00000000-0000-0000-0000-000000000000")
    }
}

impl FakeStreamAnalytics {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state lock poisoned")
    }

    /// Makes every future `call` fail with the given ARM error.
    pub fn fail_on(&self, call: Call, status: u16, code: &str, message: &str) {
        self.lock().failures.insert(
            call,
            Failure {
                status,
                code: code.into(),
                message: message.into(),
            },
        );
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn job(&self, resource_group: &str, job_name: &str) -> Option<StreamingJob> {
        self.lock()
            .jobs
            .get(&key(resource_group, job_name))
            .map(|remote| remote.job.clone())
    }

    /// Names of every child attached to the job, in function/input/output/transformation order.
    pub fn children(&self, resource_group: &str, job_name: &str) -> Vec<String> {
        let state = self.lock();
        let remote = match state.jobs.get(&key(resource_group, job_name)) {
            Some(remote) => remote,
            None => return vec![],
        };
        remote
            .functions
            .keys()
            .chain(remote.inputs.keys())
            .chain(remote.outputs.keys())
            .cloned()
            .chain(
                remote
                    .transformation
                    .iter()
                    .filter_map(|transformation| transformation.name.clone()),
            )
            .collect()
    }

    /// Changes the run-state behind the provider's back, as a portal user would.
    pub fn set_remote_job_state(&self, resource_group: &str, job_name: &str, state: &str) {
        if let Some(remote) = self.lock().jobs.get_mut(&key(resource_group, job_name)) {
            remote.set_job_state(state);
        }
    }

    fn record(&self, call: Call) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(call.clone());
        if let Some(failure) = state.failures.get(&call) {
            return Err(Error::api(
                failure.status,
                failure.code.clone(),
                failure.message.clone(),
            ));
        }
        Ok(state)
    }

    fn with_job<T>(
        &self,
        call: Call,
        resource_group: &str,
        job_name: &str,
        f: impl FnOnce(&mut RemoteJob) -> T,
    ) -> Result<T> {
        let mut state = self.record(call)?;
        let remote = state
            .jobs
            .get_mut(&key(resource_group, job_name))
            .ok_or_else(|| not_found(resource_group, job_name))?;
        Ok(f(remote))
    }
}

fn key(resource_group: &str, job_name: &str) -> (String, String) {
    (resource_group.to_string(), job_name.to_string())
}

fn not_found(resource_group: &str, job_name: &str) -> Error {
    Error::api(
        404,
        "ResourceNotFound",
        format!(
            "The Resource 'Microsoft.StreamAnalytics/streamingjobs/{}' under resource group '{}' was not found.",
            job_name, resource_group
        ),
    )
}

#[async_trait]
impl StreamAnalyticsApi for FakeStreamAnalytics {
    fn create_or_replace_job(
        &self,
        mut job: StreamingJob,
        resource_group: &str,
        job_name: &str,
        cancel: CancelSignal,
    ) -> Operation<StreamingJob> {
        let result = self
            .record(Call::CreateOrReplaceJob(job_name.into()))
            .map(|mut state| {
                let remote = state.jobs.entry(key(resource_group, job_name)).or_default();
                let previous = remote.job.properties.take().unwrap_or_default();
                let mut properties = job.properties.take().unwrap_or_default();
                properties.job_id = previous
                    .job_id
                    .or_else(|| Some(uuid::Uuid::new_v4().to_string()));
                properties.job_state = previous.job_state.or_else(|| Some("Created".into()));
                properties.provisioning_state = Some("Succeeded".into());

                job.id = Some(streaming_job_id(
                    &self.subscription_id,
                    resource_group,
                    job_name,
                ));
                job.resource_type = Some("Microsoft.StreamAnalytics/streamingjobs".into());
                job.properties = Some(properties);
                remote.job = job.clone();
                job
            });
        Operation::spawn(cancel, async move { result })
    }

    async fn get_job(&self, resource_group: &str, job_name: &str) -> Result<StreamingJob> {
        self.with_job(
            Call::GetJob(job_name.into()),
            resource_group,
            job_name,
            |remote| remote.job.clone(),
        )
    }

    fn delete_job(
        &self,
        resource_group: &str,
        job_name: &str,
        cancel: CancelSignal,
    ) -> Operation<()> {
        let result = self
            .record(Call::DeleteJob(job_name.into()))
            .and_then(|mut state| {
                // children go with the job
                state
                    .jobs
                    .remove(&key(resource_group, job_name))
                    .map(|_| ())
                    .ok_or_else(|| not_found(resource_group, job_name))
            });
        Operation::spawn(cancel, async move { result })
    }

    fn start_job(
        &self,
        resource_group: &str,
        job_name: &str,
        _parameters: StartJobParameters,
        cancel: CancelSignal,
    ) -> Operation<()> {
        let result = self.with_job(
            Call::StartJob(job_name.into()),
            resource_group,
            job_name,
            |remote| remote.set_job_state("Running"),
        );
        Operation::spawn(cancel, async move { result })
    }

    fn stop_job(
        &self,
        resource_group: &str,
        job_name: &str,
        cancel: CancelSignal,
    ) -> Operation<()> {
        let result = self.with_job(
            Call::StopJob(job_name.into()),
            resource_group,
            job_name,
            |remote| remote.set_job_state("Stopped"),
        );
        Operation::spawn(cancel, async move { result })
    }

    async fn create_or_replace_function(
        &self,
        function: Function,
        resource_group: &str,
        job_name: &str,
        function_name: &str,
    ) -> Result<Function> {
        self.with_job(
            Call::CreateOrReplaceFunction(function_name.into()),
            resource_group,
            job_name,
            |remote| {
                remote
                    .functions
                    .insert(function_name.to_string(), function.clone());
                function
            },
        )
    }

    async fn create_or_replace_input(
        &self,
        input: Input,
        resource_group: &str,
        job_name: &str,
        input_name: &str,
    ) -> Result<Input> {
        self.with_job(
            Call::CreateOrReplaceInput(input_name.into()),
            resource_group,
            job_name,
            |remote| {
                remote.inputs.insert(input_name.to_string(), input.clone());
                input
            },
        )
    }

    async fn create_or_replace_output(
        &self,
        output: Output,
        resource_group: &str,
        job_name: &str,
        output_name: &str,
    ) -> Result<Output> {
        self.with_job(
            Call::CreateOrReplaceOutput(output_name.into()),
            resource_group,
            job_name,
            |remote| {
                remote.outputs.insert(output_name.to_string(), output.clone());
                output
            },
        )
    }

    async fn create_or_replace_transformation(
        &self,
        transformation: Transformation,
        resource_group: &str,
        job_name: &str,
        transformation_name: &str,
    ) -> Result<Transformation> {
        self.with_job(
            Call::CreateOrReplaceTransformation(transformation_name.into()),
            resource_group,
            job_name,
            |remote| {
                remote.transformation = Some(transformation.clone());
                transformation
            },
        )
    }
}
