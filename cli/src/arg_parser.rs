use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Manage a Stream Analytics job through a streamjob provider server
#[derive(Debug, Parser)]
pub struct ArgParser {
    /// The address of the server
    #[clap(short = 's', long = "server", env = "STREAMJOB_SERVER", default_value = "[::1]:50051")]
    pub server: String,
    /// Name the server certificate must be issued for
    #[clap(long, env = "STREAMJOB_DOMAIN", default_value = "localhost")]
    pub domain: String,
    /// CA certificate that signed the server certificate (PEM)
    #[clap(long, env = "STREAMJOB_CA_CERT")]
    pub ca_cert: PathBuf,
    /// Client certificate (PEM); its subject UID is the user name
    #[clap(long, env = "STREAMJOB_CERT")]
    pub cert: PathBuf,
    /// Client private key (PEM)
    #[clap(long, env = "STREAMJOB_KEY")]
    pub key: PathBuf,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum SubCommand {
    /// create the job, or update it when the state file already tracks one
    Apply {
        /// job declaration (TOML)
        #[clap(long)]
        config: PathBuf,
        #[clap(long, default_value = "job.state.json")]
        state: PathBuf,
    },
    /// refresh the state file from the remote job
    Refresh {
        #[clap(long, default_value = "job.state.json")]
        state: PathBuf,
    },
    /// delete the job tracked by the state file
    Destroy {
        #[clap(long, default_value = "job.state.json")]
        state: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const TLS: &[&str] = &["--ca-cert", "ca.cert", "--cert", "alice.cert", "--key", "alice.key"];

    fn argv(rest: &[&'static str]) -> Vec<&'static str> {
        let mut argv = vec!["cli"];
        argv.extend_from_slice(TLS);
        argv.extend_from_slice(rest);
        argv
    }

    fn parse(rest: &[&'static str]) -> ArgParser {
        ArgParser::try_parse_from(argv(rest)).unwrap()
    }

    #[test]
    fn apply_takes_config_and_state() {
        let args = parse(&["apply", "--config", "job.toml", "--state", "s.json"]);
        assert_eq!(
            args.sub_command,
            SubCommand::Apply {
                config: "job.toml".into(),
                state: "s.json".into(),
            }
        );
        assert_eq!(args.domain, "localhost");
    }

    #[test]
    fn state_path_defaults() {
        let args = parse(&["destroy"]);
        assert_eq!(
            args.sub_command,
            SubCommand::Destroy {
                state: "job.state.json".into()
            }
        );
    }

    #[test]
    fn apply_requires_config() {
        assert!(ArgParser::try_parse_from(argv(&["apply"])).is_err());
    }
}
