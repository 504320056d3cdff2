mod arg_parser;
mod client_cli;

use arg_parser::{ArgParser, SubCommand};
use client_cli::{ClientCli, TlsFiles};

use clap::Parser;
use std::error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = ArgParser::parse();
    let tls = TlsFiles {
        domain: &args.domain,
        ca_cert: &args.ca_cert,
        cert: &args.cert,
        key: &args.key,
    };
    let mut client = ClientCli::connect(&args.server, tls).await?;

    match args.sub_command {
        SubCommand::Apply { config, state } => {
            client.apply(&config, &state).await?;
        }
        SubCommand::Refresh { state } => {
            client.refresh(&state).await?;
        }
        SubCommand::Destroy { state } => {
            client.destroy(&state).await?;
        }
    }

    Ok(())
}
