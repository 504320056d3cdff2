mod lro;

use self::lro::PollTarget;
use super::StreamAnalyticsApi;
use crate::error::{Error, Result};
use crate::models::{
    ErrorResponse, Function, Input, Output, StartJobParameters, StreamingJob, Transformation,
};
use crate::operation::{CancelSignal, Operation};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, trace};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_API_VERSION: &str = "2016-03-01";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ArmConfig {
    pub endpoint: String,
    pub subscription_id: String,
    pub api_version: String,
    /// Delay between polls of a long-running operation when ARM sends no `Retry-After`.
    pub poll_interval: Duration,
}

impl ArmConfig {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            subscription_id: subscription_id.into(),
            api_version: DEFAULT_API_VERSION.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// `StreamAnalyticsApi` over the Azure Resource Manager REST API.
///
/// Cloning is cheap; clones share the HTTP connection pool. Long-running calls move a clone into
/// the operation task.
#[derive(Clone)]
pub struct ArmClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    config: ArmConfig,
    token: String,
}

impl ArmClient {
    pub fn new(config: ArmConfig, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("streamjob/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                token: token.into(),
            }),
        })
    }

    fn job_url(&self, resource_group: &str, job_name: &str) -> String {
        let config = &self.inner.config;
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.StreamAnalytics/streamingjobs/{}",
            config.endpoint.trim_end_matches('/'),
            config.subscription_id,
            resource_group,
            job_name
        )
    }

    fn child_url(
        &self,
        resource_group: &str,
        job_name: &str,
        collection: &str,
        name: &str,
    ) -> String {
        format!(
            "{}/{}/{}",
            self.job_url(resource_group, job_name),
            collection,
            name
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .bearer_auth(&self.inner.token)
            .query(&[("api-version", self.inner.config.api_version.as_str())])
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        check(response).await
    }

    async fn put_child<T>(&self, url: String, body: &T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        debug!(%url, "submitting child resource");
        let response = self.send(self.request(Method::PUT, &url).json(body)).await?;
        Ok(response.json().await?)
    }

    async fn put_job(
        self,
        resource_group: String,
        job_name: String,
        job: StreamingJob,
    ) -> Result<StreamingJob> {
        let url = self.job_url(&resource_group, &job_name);
        debug!(%url, "submitting streaming job");
        let response = self.send(self.request(Method::PUT, &url).json(&job)).await?;
        match PollTarget::from_response(&response) {
            Some(target) => {
                let delay = lro::retry_after(response.headers())
                    .unwrap_or(self.inner.config.poll_interval);
                self.poll(target, delay).await?;
                // the initial body may predate the final state, fetch the settled resource
                self.get_job(&resource_group, &job_name).await
            }
            None => Ok(response.json().await?),
        }
    }

    async fn post_and_wait(self, url: String, body: Option<StartJobParameters>) -> Result<()> {
        debug!(%url, "issuing job action");
        let mut request = self.request(Method::POST, &url);
        request = match body {
            Some(body) => request.json(&body),
            None => request.header(reqwest::header::CONTENT_LENGTH, 0),
        };
        let response = self.send(request).await?;
        self.wait_if_pending(response).await
    }

    async fn delete_and_wait(self, url: String) -> Result<()> {
        debug!(%url, "deleting streaming job");
        let response = self.send(self.request(Method::DELETE, &url)).await?;
        self.wait_if_pending(response).await
    }

    async fn wait_if_pending(&self, response: Response) -> Result<()> {
        if let Some(target) = PollTarget::from_response(&response) {
            let delay = lro::retry_after(response.headers())
                .unwrap_or(self.inner.config.poll_interval);
            self.poll(target, delay).await?;
        } else {
            trace!(status = %response.status(), "operation completed synchronously");
        }
        Ok(())
    }
}

/// Turns non-2xx responses into `Error::Api`, preferring the ARM error envelope when present.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|envelope| envelope.error)
        .unwrap_or_default();
    let code = if detail.code.is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        detail.code
    };
    let message = if detail.message.is_empty() {
        body
    } else {
        detail.message
    };
    Err(Error::api(status.as_u16(), code, message))
}

#[async_trait]
impl StreamAnalyticsApi for ArmClient {
    fn create_or_replace_job(
        &self,
        job: StreamingJob,
        resource_group: &str,
        job_name: &str,
        cancel: CancelSignal,
    ) -> Operation<StreamingJob> {
        let this = self.clone();
        let (resource_group, job_name) = (resource_group.to_string(), job_name.to_string());
        Operation::spawn(cancel, this.put_job(resource_group, job_name, job))
    }

    async fn get_job(&self, resource_group: &str, job_name: &str) -> Result<StreamingJob> {
        let url = self.job_url(resource_group, job_name);
        debug!(%url, "fetching streaming job");
        let response = self.send(self.request(Method::GET, &url)).await?;
        Ok(response.json().await?)
    }

    fn delete_job(
        &self,
        resource_group: &str,
        job_name: &str,
        cancel: CancelSignal,
    ) -> Operation<()> {
        let url = self.job_url(resource_group, job_name);
        Operation::spawn(cancel, self.clone().delete_and_wait(url))
    }

    fn start_job(
        &self,
        resource_group: &str,
        job_name: &str,
        parameters: StartJobParameters,
        cancel: CancelSignal,
    ) -> Operation<()> {
        let url = format!("{}/start", self.job_url(resource_group, job_name));
        Operation::spawn(cancel, self.clone().post_and_wait(url, Some(parameters)))
    }

    fn stop_job(
        &self,
        resource_group: &str,
        job_name: &str,
        cancel: CancelSignal,
    ) -> Operation<()> {
        let url = format!("{}/stop", self.job_url(resource_group, job_name));
        Operation::spawn(cancel, self.clone().post_and_wait(url, None))
    }

    async fn create_or_replace_function(
        &self,
        function: Function,
        resource_group: &str,
        job_name: &str,
        function_name: &str,
    ) -> Result<Function> {
        let url = self.child_url(resource_group, job_name, "functions", function_name);
        self.put_child(url, &function).await
    }

    async fn create_or_replace_input(
        &self,
        input: Input,
        resource_group: &str,
        job_name: &str,
        input_name: &str,
    ) -> Result<Input> {
        let url = self.child_url(resource_group, job_name, "inputs", input_name);
        self.put_child(url, &input).await
    }

    async fn create_or_replace_output(
        &self,
        output: Output,
        resource_group: &str,
        job_name: &str,
        output_name: &str,
    ) -> Result<Output> {
        let url = self.child_url(resource_group, job_name, "outputs", output_name);
        self.put_child(url, &output).await
    }

    async fn create_or_replace_transformation(
        &self,
        transformation: Transformation,
        resource_group: &str,
        job_name: &str,
        transformation_name: &str,
    ) -> Result<Transformation> {
        let url = self.child_url(
            resource_group,
            job_name,
            "transformations",
            transformation_name,
        );
        self.put_child(url, &transformation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::cancellation;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

    const JOB_PATH: &str =
        "/subscriptions/sub-1/resourceGroups/rg1/providers/Microsoft.StreamAnalytics/streamingjobs/job1";

    fn client_for(server: &MockServer) -> ArmClient {
        let mut config = ArmConfig::new("sub-1");
        config.endpoint = server.uri();
        config.poll_interval = Duration::from_millis(10);
        ArmClient::new(config, "token").unwrap()
    }

    /// A management API request: bearer token and api-version are both required to match.
    fn arm(http_method: &str, url_path: &str) -> MockBuilder {
        Mock::given(method(http_method))
            .and(path(url_path))
            .and(bearer_token("token"))
            .and(query_param("api-version", DEFAULT_API_VERSION))
    }

    fn client() -> ArmClient {
        let mut config = ArmConfig::new("sub-1");
        config.endpoint = "https://arm.example/".into();
        ArmClient::new(config, "token").unwrap()
    }

    #[test]
    fn builds_job_and_child_urls() {
        let client = client();
        assert_eq!(
            client.job_url("rg1", "job1"),
            "https://arm.example/subscriptions/sub-1/resourceGroups/rg1/providers/Microsoft.StreamAnalytics/streamingjobs/job1"
        );
        assert!(client
            .child_url("rg1", "job1", "inputs", "in1")
            .ends_with("/streamingjobs/job1/inputs/in1"));
    }

    #[tokio::test]
    async fn arm_error_envelope_becomes_api_error() {
        let response = http::Response::builder()
            .status(409)
            .body(r#"{"error":{"code":"Conflict","message":"job is running"}}"#)
            .unwrap();
        let err = check(Response::from(response)).await.unwrap_err();
        match err {
            Error::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 409);
                assert_eq!(code, "Conflict");
                assert_eq!(message, "job is running");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_falls_back_to_reason() {
        let response = http::Response::builder()
            .status(404)
            .body("no such job")
            .unwrap();
        let err = check(Response::from(response)).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Not Found"));
        assert!(err.to_string().contains("no such job"));
    }

    #[tokio::test]
    async fn put_job_polls_async_operation_then_fetches_settled_job() {
        let server = MockServer::start().await;
        let operation_url = format!("{}/operations/put1", server.uri());
        arm("PUT", JOB_PATH)
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Azure-AsyncOperation", operation_url.as_str())
                    .set_body_json(json!({
                        "name": "job1",
                        "properties": { "provisioningState": "Creating" }
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/put1"))
            .and(bearer_token("token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "InProgress" })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/put1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Succeeded" })))
            .expect(1)
            .mount(&server)
            .await;
        arm("GET", JOB_PATH)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": JOB_PATH,
                "name": "job1",
                "properties": { "provisioningState": "Succeeded", "jobState": "Created" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (_cancel, signal) = cancellation();
        let job = client_for(&server)
            .create_or_replace_job(
                StreamingJob {
                    name: Some("job1".into()),
                    ..Default::default()
                },
                "rg1",
                "job1",
                signal,
            )
            .wait()
            .await
            .unwrap();

        assert_eq!(job.id.as_deref(), Some(JOB_PATH));
        assert_eq!(
            job.properties.unwrap().job_state.as_deref(),
            Some("Created")
        );
    }

    #[tokio::test]
    async fn put_job_answered_synchronously_uses_the_response_body() {
        let server = MockServer::start().await;
        arm("PUT", JOB_PATH)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": JOB_PATH,
                "name": "job1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        arm("GET", JOB_PATH)
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (_cancel, signal) = cancellation();
        let job = client_for(&server)
            .create_or_replace_job(StreamingJob::default(), "rg1", "job1", signal)
            .wait()
            .await
            .unwrap();
        assert_eq!(job.id.as_deref(), Some(JOB_PATH));
    }

    #[tokio::test]
    async fn failed_start_reports_operation_failed() {
        let server = MockServer::start().await;
        let operation_url = format!("{}/operations/start1", server.uri());
        arm("POST", &format!("{}/start", JOB_PATH))
            .and(body_partial_json(json!({ "outputStartMode": "JobStartTime" })))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Azure-AsyncOperation", operation_url.as_str())
                    .insert_header("Retry-After", "0"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/start1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "error": { "code": "JobFailed", "message": "input unreachable" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (_cancel, signal) = cancellation();
        let err = client_for(&server)
            .start_job("rg1", "job1", StartJobParameters::default(), signal)
            .wait()
            .await
            .unwrap_err();

        match err {
            Error::OperationFailed { status, message } => {
                assert_eq!(status, "Failed");
                assert!(message.contains("JobFailed"));
                assert!(message.contains("input unreachable"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn stop_polls_location_until_it_stops_answering_accepted() {
        let server = MockServer::start().await;
        let location = format!("{}/results/stop1", server.uri());
        arm("POST", &format!("{}/stop", JOB_PATH))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Location", location.as_str())
                    .insert_header("Retry-After", "0"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/results/stop1"))
            .respond_with(ResponseTemplate::new(202).insert_header("Retry-After", "0"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/results/stop1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (_cancel, signal) = cancellation();
        client_for(&server)
            .stop_job("rg1", "job1", signal)
            .wait()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_answered_with_no_content_succeeds() {
        let server = MockServer::start().await;
        arm("DELETE", JOB_PATH)
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let (_cancel, signal) = cancellation();
        client_for(&server)
            .delete_job("rg1", "job1", signal)
            .wait()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_of_missing_job_is_not_found() {
        let server = MockServer::start().await;
        arm("GET", JOB_PATH)
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "ResourceNotFound", "message": "job1 was not found" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).get_job("rg1", "job1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn child_submission_is_authenticated_and_versioned() {
        let server = MockServer::start().await;
        arm("PUT", &format!("{}/transformations/t1", JOB_PATH))
            .and(body_partial_json(json!({ "name": "t1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": format!("{}/transformations/t1", JOB_PATH),
                "name": "t1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transformation = Transformation {
            name: Some("t1".into()),
            ..Default::default()
        };
        let submitted = client_for(&server)
            .create_or_replace_transformation(transformation, "rg1", "job1", "t1")
            .await
            .unwrap();
        assert_eq!(submitted.name.as_deref(), Some("t1"));

        // a different token no longer matches, and the unmatched request comes back as 404
        let mut config = ArmConfig::new("sub-1");
        config.endpoint = server.uri();
        let stranger = ArmClient::new(config, "other-token").unwrap();
        let err = stranger
            .create_or_replace_transformation(Transformation::default(), "rg1", "job1", "t1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
