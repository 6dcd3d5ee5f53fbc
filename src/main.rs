//! Prints an access token for a service account.

use std::path::PathBuf;

use clap::Parser;
use paic_token::{
    TokenError,
    config::{ClientConfig, ConfigError},
    output::OutputFormat,
    service_account::get_access_token,
};
use snafu::prelude::*;
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt as _, reload, util::SubscriberInitExt as _,
};

/// Get an identity platform service account access token
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (JSON or YAML)
    #[arg(short = 'C', long)]
    config: PathBuf,

    /// Log request details to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Output format, overriding the configuration file
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,
}

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("Failed to load configuration"))]
    LoadConfig { source: ConfigError },
    #[snafu(display("Failed to get access token"))]
    GetToken { source: TokenError },
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,paic_token=debug"
    } else {
        "warn"
    }
}

fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Installs the stderr logger. The returned handle raises the level once the
/// configuration file has been read.
fn init_logging(verbose: bool) -> reload::Handle<EnvFilter, Registry> {
    let (filter, handle) = reload::Layer::new(log_filter(verbose));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    handle
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    let logging = init_logging(args.verbose);

    let config = ClientConfig::load(&args.config).context(LoadConfigSnafu)?;
    if config.verbose
        && !args.verbose
        && let Err(error) = logging.reload(log_filter(true))
    {
        tracing::warn!(%error, "failed to enable verbose logging");
    }

    let response = get_access_token(&config).await.context(GetTokenSnafu)?;

    let format = args.output.unwrap_or(config.output_format);
    println!("{}", format.render(&response));
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let args =
            Args::try_parse_from(["paic-token", "-C", "config.yaml", "-v", "-o", "bearer"])
                .unwrap();

        assert_eq!(args.config, PathBuf::from("config.yaml"));
        assert!(args.verbose);
        assert_eq!(args.output, Some(OutputFormat::Bearer));
    }

    #[test]
    fn test_config_flag_required() {
        assert!(Args::try_parse_from(["paic-token"]).is_err());
        assert!(Args::try_parse_from(["paic-token", "-C", "c.json", "-o", "xml"]).is_err());
    }

    #[test]
    fn test_verbose_enables_crate_debug_logs() {
        assert_eq!(default_directives(true), "warn,paic_token=debug");
        assert_eq!(default_directives(false), "warn");
    }
}
