mod config;
mod interceptors;
mod logging;
mod services;

use clap::Parser;
use config::ServerConfig;
pub use interceptors::cert::UserExtension;
use interceptors::cert;
use protobuf::streaming_job_provider_server::StreamingJobProviderServer;
use services::provider::StreamingJobProviderService;
use std::path::PathBuf;
use streamjob::client::ArmClient;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::info;

/// gRPC provider for Stream Analytics streaming jobs
#[derive(Debug, Parser)]
struct Args {
    /// Path to the server configuration file
    #[clap(long, env = "STREAMJOB_SERVER_CONFIG", default_value = "server.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = ServerConfig::load(&args.config)?;
    logging::init(&config.logging)?;
    serve(config).await
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // load server identity
    let cert = tokio::fs::read(&config.tls.cert).await?;
    let key = tokio::fs::read(&config.tls.key).await?;
    let server_identity = Identity::from_pem(cert, key);

    // load CA cert
    let ca_cert = tokio::fs::read(&config.tls.client_ca).await?;
    let ca_cert = Certificate::from_pem(ca_cert);

    let tls_config = ServerTlsConfig::new()
        .identity(server_identity)
        .client_ca_root(ca_cert);

    let client = ArmClient::new(config.arm_config(), config.arm_token()?)?;
    let provider = StreamingJobProviderService::new(client, &config.users);
    let provider_server =
        StreamingJobProviderServer::with_interceptor(provider, cert::extract_subj_uid);

    let addr = config.server.listen;
    info!(%addr, users = config.users.len(), "listening");

    Server::builder()
        .tls_config(tls_config)?
        .add_service(provider_server)
        .serve(addr)
        .await?;

    Ok(())
}
