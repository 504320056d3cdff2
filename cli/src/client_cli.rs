use protobuf::{
    diagnostic::Severity, streaming_job_provider_client::StreamingJobProviderClient,
    CreateRequest, DeleteRequest, Diagnostic, DynamicValue, ReadRequest, UpdateRequest,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid job declaration: {0}")]
    Declaration(#[from] toml::de::Error),
    #[error("invalid state: {0}")]
    State(#[from] serde_json::Error),
    #[error("state file {0:?} does not exist")]
    MissingState(PathBuf),
    #[error("invalid server address: {0}")]
    InvalidServer(String),
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
    #[error("server rejected the request: {0}")]
    Status(#[from] tonic::Status),
    #[error("{0} error diagnostic(s) reported")]
    Diagnostics(usize),
}

pub struct TlsFiles<'a> {
    pub domain: &'a str,
    pub ca_cert: &'a Path,
    pub cert: &'a Path,
    pub key: &'a Path,
}

pub struct ClientCli {
    inner: StreamingJobProviderClient<Channel>,
}

impl ClientCli {
    pub async fn connect(server_addr: &str, tls: TlsFiles<'_>) -> Result<Self, CliError> {
        let server_root_ca_cert = Certificate::from_pem(read(tls.ca_cert).await?);
        let client_identity = Identity::from_pem(read(tls.cert).await?, read(tls.key).await?);
        let tls = ClientTlsConfig::new()
            .domain_name(tls.domain)
            .ca_certificate(server_root_ca_cert)
            .identity(client_identity);

        let channel = Channel::from_shared(format!("https://{}", server_addr))
            .map_err(|e| CliError::InvalidServer(e.to_string()))?
            .tls_config(tls)?
            .connect()
            .await?;
        Ok(Self {
            inner: StreamingJobProviderClient::new(channel),
        })
    }

    /// Creates the job when `state` tracks none yet, otherwise updates it.
    pub async fn apply(&mut self, config: &Path, state: &Path) -> Result<(), CliError> {
        let declaration = tokio::fs::read_to_string(config)
            .await
            .map_err(|source| CliError::Io {
                path: config.to_path_buf(),
                source,
            })?;
        let config = declaration_json(&declaration)?;

        let prior_state = match read_state(state).await? {
            Some(prior) if has_id(&prior)? => Some(prior),
            _ => None,
        };
        let response = match prior_state {
            None => {
                self.inner
                    .create_job(CreateRequest {
                        config: Some(config),
                    })
                    .await?
            }
            Some(prior_state) => {
                self.inner
                    .update_job(UpdateRequest {
                        config: Some(config),
                        prior_state: Some(prior_state),
                    })
                    .await?
            }
        }
        .into_inner();

        // written before reporting, so a partially created job is still tracked
        if let Some(new_state) = &response.new_state {
            write_state(state, new_state).await?;
        }
        report(&response.diagnostics)
    }

    pub async fn refresh(&mut self, state: &Path) -> Result<(), CliError> {
        let current_state = read_state(state)
            .await?
            .ok_or_else(|| CliError::MissingState(state.to_path_buf()))?;
        let response = self
            .inner
            .read_job(ReadRequest {
                current_state: Some(current_state),
            })
            .await?
            .into_inner();
        if let Some(new_state) = &response.new_state {
            write_state(state, new_state).await?;
        }
        report(&response.diagnostics)
    }

    pub async fn destroy(&mut self, state: &Path) -> Result<(), CliError> {
        let prior_state = read_state(state)
            .await?
            .ok_or_else(|| CliError::MissingState(state.to_path_buf()))?;
        let response = self
            .inner
            .delete_job(DeleteRequest {
                prior_state: Some(prior_state),
            })
            .await?
            .into_inner();
        if let Some(new_state) = &response.new_state {
            write_state(state, new_state).await?;
        }
        report(&response.diagnostics)
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    tokio::fs::read(path).await.map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_state(path: &Path) -> Result<Option<DynamicValue>, CliError> {
    match tokio::fs::read(path).await {
        Ok(json) => Ok(Some(DynamicValue { json })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CliError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write_state(path: &Path, state: &DynamicValue) -> Result<(), CliError> {
    let value: serde_json::Value = serde_json::from_slice(&state.json)?;
    let pretty = serde_json::to_vec_pretty(&value)?;
    tokio::fs::write(path, pretty)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// The server takes declarations as JSON; users write them as TOML.
fn declaration_json(declaration: &str) -> Result<DynamicValue, CliError> {
    let value: serde_json::Value = toml::from_str(declaration)?;
    Ok(DynamicValue {
        json: serde_json::to_vec(&value)?,
    })
}

fn has_id(state: &DynamicValue) -> Result<bool, CliError> {
    let value: serde_json::Value = serde_json::from_slice(&state.json)?;
    Ok(value.get("id").map_or(false, |id| id.is_string()))
}

fn report(diagnostics: &[Diagnostic]) -> Result<(), CliError> {
    let mut errors = 0;
    for diagnostic in diagnostics {
        let label = match Severity::from_i32(diagnostic.severity) {
            Some(Severity::Error) => {
                errors += 1;
                "error"
            }
            Some(Severity::Warning) => "warning",
            _ => "diagnostic",
        };
        eprintln!("{}: {}\n  {}", label, diagnostic.summary, diagnostic.detail);
    }
    if errors > 0 {
        return Err(CliError::Diagnostics(errors));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn toml_declaration_becomes_json() {
        let config = declaration_json(
            r#"
            name = "job1"
            sku = "Standard"
            resource_group_name = "rg1"
            location = "westus"

            [[job_input]]
            name = "in1"
            type = "Stream"
            datasource = { type = "Microsoft.ServiceBus/EventHub" }
            serialization = { type = "Json" }
            "#,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&config.json).unwrap();
        assert_eq!(value["name"], "job1");
        assert_eq!(value["job_input"][0]["serialization"]["type"], "Json");
    }

    #[test]
    fn state_without_id_means_create() {
        let state = |value: serde_json::Value| DynamicValue {
            json: serde_json::to_vec(&value).unwrap(),
        };
        assert!(!has_id(&state(json!({ "config": {} }))).unwrap());
        assert!(has_id(&state(json!({ "id": "/subscriptions/s", "config": {} }))).unwrap());
    }

    #[test]
    fn error_diagnostics_fail_the_command() {
        let warning = Diagnostic {
            severity: Severity::Warning as i32,
            summary: "heads up".into(),
            detail: String::new(),
        };
        assert!(report(&[warning.clone()]).is_ok());

        let error = Diagnostic {
            severity: Severity::Error as i32,
            summary: "failed".into(),
            detail: "boom".into(),
        };
        assert!(matches!(
            report(&[warning, error]),
            Err(CliError::Diagnostics(1))
        ));
    }

    #[tokio::test]
    async fn missing_state_file_reads_as_none() {
        let path = std::env::temp_dir().join("streamjob-cli-missing-state.json");
        let _ = tokio::fs::remove_file(&path).await;
        assert!(read_state(&path).await.unwrap().is_none());
    }
}
