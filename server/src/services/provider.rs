mod authorizer;

pub use self::authorizer::Role;
use self::authorizer::{Action, Authorizer};
use crate::config::UserConfig;
use crate::UserExtension;
use protobuf::diagnostic::Severity;
use protobuf::streaming_job_provider_server::StreamingJobProvider;
use protobuf::{
    ApplyResponse, CreateRequest, DeleteRequest, DeleteResponse, Diagnostic, DynamicValue,
    ReadRequest, ReadResponse, UpdateRequest,
};
use serde::{de::DeserializeOwned, Serialize};
use streamjob::{JobConfiguration, JobLifecycle, ResourceData, StreamAnalyticsApi};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

pub type UserId = String;

// tonic wraps this in Arc anyway internally, so we don't need Arc
pub struct StreamingJobProviderService<C> {
    lifecycle: JobLifecycle<C>,
    authorizer: Authorizer,
}

impl<C: StreamAnalyticsApi> StreamingJobProviderService<C> {
    pub fn new(client: C, users: &[UserConfig]) -> Self {
        Self {
            lifecycle: JobLifecycle::new(client),
            authorizer: Authorizer::new(users),
        }
    }

    fn authorize<T>(&self, req: &Request<T>, action: Action) -> Result<UserId, Status> {
        let user_id = req
            .extensions()
            .get::<UserExtension>()
            .map(|ext| ext.user_id.clone())
            .ok_or_else(|| Status::unauthenticated("missing user id"))?;
        if !self.authorizer.is_authorized(&user_id, action) {
            warn!(%user_id, ?action, "request denied");
            return Err(Status::permission_denied(format!(
                "user {} may not {:?} streaming jobs",
                user_id, action
            )));
        }
        Ok(user_id)
    }
}

fn decode<T: DeserializeOwned>(value: Option<DynamicValue>, field: &str) -> Result<T, Status> {
    let value = value.ok_or_else(|| Status::invalid_argument(format!("missing {}", field)))?;
    serde_json::from_slice(&value.json)
        .map_err(|e| Status::invalid_argument(format!("malformed {}: {}", field, e)))
}

fn encode<T: Serialize>(value: &T) -> Result<DynamicValue, Status> {
    let json = serde_json::to_vec(value)
        .map_err(|e| Status::internal(format!("failed to encode state: {}", e)))?;
    Ok(DynamicValue { json })
}

fn validated(config: JobConfiguration) -> Result<JobConfiguration, Status> {
    config
        .validate()
        .map_err(|e| Status::invalid_argument(e.to_string()))?;
    Ok(config)
}

fn diagnostics(result: streamjob::Result<()>, summary: &str) -> Vec<Diagnostic> {
    match result {
        Ok(()) => vec![],
        Err(e) => vec![Diagnostic {
            severity: Severity::Error as i32,
            summary: summary.into(),
            detail: e.to_string(),
        }],
    }
}

#[tonic::async_trait]
impl<C> StreamingJobProvider for StreamingJobProviderService<C>
where
    C: StreamAnalyticsApi + 'static,
{
    async fn create_job(
        &self,
        req: Request<CreateRequest>,
    ) -> Result<Response<ApplyResponse>, Status> {
        let user_id = self.authorize(&req, Action::Create)?;
        let config = validated(decode(req.into_inner().config, "config")?)?;
        info!(%user_id, job_name = %config.name, "create requested");

        let mut d = ResourceData::new(config);
        let result = self.lifecycle.create(&mut d).await;

        // nothing to track until the job itself exists remotely
        let new_state = match d.id() {
            Some(_) => Some(encode(&d)?),
            None => None,
        };
        Ok(Response::new(ApplyResponse {
            new_state,
            diagnostics: diagnostics(result, "failed to create streaming job"),
        }))
    }

    async fn read_job(&self, req: Request<ReadRequest>) -> Result<Response<ReadResponse>, Status> {
        let user_id = self.authorize(&req, Action::Read)?;
        let mut d: ResourceData = decode(req.into_inner().current_state, "current_state")?;
        info!(%user_id, job_name = %d.config().name, "read requested");

        let result = self.lifecycle.read(&mut d).await;
        Ok(Response::new(ReadResponse {
            new_state: Some(encode(&d)?),
            diagnostics: diagnostics(result, "failed to read streaming job"),
        }))
    }

    async fn update_job(
        &self,
        req: Request<UpdateRequest>,
    ) -> Result<Response<ApplyResponse>, Status> {
        let user_id = self.authorize(&req, Action::Update)?;
        let UpdateRequest {
            config,
            prior_state,
        } = req.into_inner();
        let config = validated(decode(config, "config")?)?;
        let prior: ResourceData = decode(prior_state, "prior_state")?;

        if prior.id().is_none() {
            return Err(Status::failed_precondition(
                "prior state has no job id, create the job instead",
            ));
        }
        let previous = prior.config();
        if previous.name != config.name || previous.resource_group_name != config.resource_group_name
        {
            return Err(Status::failed_precondition(
                "changing name or resource_group_name requires replacing the job",
            ));
        }
        info!(%user_id, job_name = %config.name, "update requested");

        let mut d = ResourceData::planned(config, prior);
        let result = self.lifecycle.update(&mut d).await;
        Ok(Response::new(ApplyResponse {
            new_state: Some(encode(&d)?),
            diagnostics: diagnostics(result, "failed to update streaming job"),
        }))
    }

    async fn delete_job(
        &self,
        req: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let user_id = self.authorize(&req, Action::Delete)?;
        let mut d: ResourceData = decode(req.into_inner().prior_state, "prior_state")?;
        info!(%user_id, job_name = %d.config().name, "delete requested");

        let result = self.lifecycle.delete(&mut d).await;
        Ok(Response::new(DeleteResponse {
            new_state: Some(encode(&d)?),
            diagnostics: diagnostics(result, "failed to delete streaming job"),
        }))
    }
}
