use super::ArmClient;
use crate::error::{Error, Result};
use crate::models::AsyncOperationStatus;
use reqwest::{header::HeaderMap, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::trace;

// `Azure-AsyncOperation`; header names are matched case-insensitively
const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Where ARM wants us to look for the outcome of an accepted request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum PollTarget {
    /// A status document that reports `InProgress` until the operation settles.
    AsyncOperation(String),
    /// A URL that keeps answering `202 Accepted` until the operation settles.
    Location(String),
}

impl PollTarget {
    pub(super) fn from_response(response: &Response) -> Option<Self> {
        Self::from_parts(response.status(), response.headers())
    }

    fn from_parts(status: StatusCode, headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        if let Some(url) = header(ASYNC_OPERATION_HEADER) {
            return Some(PollTarget::AsyncOperation(url));
        }
        if status == StatusCode::ACCEPTED {
            return header(reqwest::header::LOCATION.as_str()).map(PollTarget::Location);
        }
        None
    }
}

pub(super) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl ArmClient {
    /// Polls until the operation behind `target` settles. Returns early only through errors;
    /// cancellation happens by dropping this future.
    pub(super) async fn poll(&self, target: PollTarget, first_delay: Duration) -> Result<()> {
        let mut delay = first_delay;
        loop {
            sleep(delay).await;
            let url = match &target {
                PollTarget::AsyncOperation(url) | PollTarget::Location(url) => url,
            };
            // poll URLs come back fully qualified, api-version included
            let request = self.inner.http.get(url).bearer_auth(&self.inner.token);
            let response = self.send(request).await?;
            let next_delay = retry_after(response.headers());

            match &target {
                PollTarget::AsyncOperation(_) => {
                    let document: AsyncOperationStatus = response.json().await?;
                    match document.status.as_str() {
                        "Succeeded" => return Ok(()),
                        "Failed" | "Canceled" => {
                            let detail = document.error.unwrap_or_default();
                            return Err(Error::OperationFailed {
                                status: document.status,
                                message: format!("{}: {}", detail.code, detail.message),
                            });
                        }
                        status => trace!(%status, "operation still in progress"),
                    }
                }
                PollTarget::Location(_) => {
                    if response.status() != StatusCode::ACCEPTED {
                        return Ok(());
                    }
                    trace!("operation still accepted");
                }
            }
            delay = next_delay.unwrap_or(self.inner.config.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ArmConfig, StreamAnalyticsApi};
    use crate::operation::cancellation;
    use reqwest::header::{HeaderValue, LOCATION, RETRY_AFTER};
    use serde_json::json;
    use tokio::time::timeout;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, poll_interval: Duration) -> ArmClient {
        let mut config = ArmConfig::new("sub-1");
        config.endpoint = server.uri();
        config.poll_interval = poll_interval;
        ArmClient::new(config, "token").unwrap()
    }

    #[test]
    fn async_operation_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            ASYNC_OPERATION_HEADER,
            HeaderValue::from_static("https://arm.example/operations/1"),
        );
        headers.insert(LOCATION, HeaderValue::from_static("https://arm.example/results/1"));
        assert_eq!(
            PollTarget::from_parts(StatusCode::CREATED, &headers),
            Some(PollTarget::AsyncOperation(
                "https://arm.example/operations/1".into()
            ))
        );
    }

    #[test]
    fn location_only_counts_for_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("https://arm.example/results/1"));
        assert_eq!(
            PollTarget::from_parts(StatusCode::ACCEPTED, &headers),
            Some(PollTarget::Location("https://arm.example/results/1".into()))
        );
        assert_eq!(PollTarget::from_parts(StatusCode::OK, &headers), None);
        assert_eq!(PollTarget::from_parts(StatusCode::OK, &HeaderMap::new()), None);
    }

    #[test]
    fn retry_after_is_read_in_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("15"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn retry_after_overrides_the_poll_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Retry-After", "0")
                    .set_body_json(json!({ "status": "InProgress" })),
            )
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Succeeded" })))
            .expect(1)
            .mount(&server)
            .await;

        // an hour between polls unless the server says otherwise
        let client = client_for(&server, Duration::from_secs(3600));
        let target = PollTarget::AsyncOperation(format!("{}/operations/op1", server.uri()));
        timeout(Duration::from_secs(5), client.poll(target, Duration::ZERO))
            .await
            .expect("Retry-After was not honoured")
            .unwrap();
    }

    #[tokio::test]
    async fn canceled_operation_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Canceled" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(10));
        let target = PollTarget::AsyncOperation(format!("{}/operations/op2", server.uri()));
        let err = client.poll(target, Duration::ZERO).await.unwrap_err();
        assert!(matches!(
            err,
            Error::OperationFailed { ref status, .. } if status == "Canceled"
        ));
    }

    #[tokio::test]
    async fn dropping_the_guard_stops_polling() {
        let server = MockServer::start().await;
        let location = format!("{}/results/stop1", server.uri());
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Location", location.as_str())
                    .insert_header("Retry-After", "1"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/results/stop1"))
            .respond_with(ResponseTemplate::new(202).insert_header("Retry-After", "1"))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(1));
        let (cancel, signal) = cancellation();
        let operation = client.stop_job("rg1", "job1", signal);

        // let the POST go out, then give up while the first poll is still scheduled
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(cancel);
        let err = timeout(Duration::from_secs(5), operation.wait())
            .await
            .expect("cancelled operation did not settle")
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        // past the point where the first poll would have fired
        tokio::time::sleep(Duration::from_millis(1200)).await;
        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
    }
}
