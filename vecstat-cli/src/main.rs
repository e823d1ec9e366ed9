//! vecstat-cli - Command-line interface for vecstat
//!
//! Provides both a REPL and one-shot aggregate requests.

mod commands;
mod repl;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vecstat_client::{Client, ConnectionConfig};
use vecstat_core::Aggregate;

#[derive(Parser)]
#[command(name = "vecstat-cli")]
#[command(about = "Command-line interface for the vecstat aggregate server")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4545", env = "VECSTAT_SERVER")]
    server: SocketAddr,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Print one-shot results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Largest value
    Max(VectorArgs),

    /// Smallest value
    Min(VectorArgs),

    /// Upper-middle value of the sorted vector
    Median(VectorArgs),

    /// Most frequent value (smallest on ties)
    Mode(VectorArgs),

    /// Send an arbitrary command code
    Raw {
        /// Command code
        #[arg(allow_negative_numbers = true)]
        code: i64,

        #[command(flatten)]
        vector: VectorArgs,
    },
}

impl Commands {
    /// Splits a one-shot command into its wire code and vector arguments.
    fn into_request(self) -> Option<(i64, VectorArgs)> {
        match self {
            Commands::Repl => None,
            Commands::Max(args) => Some((Aggregate::Max.code(), args)),
            Commands::Min(args) => Some((Aggregate::Min.code(), args)),
            Commands::Median(args) => Some((Aggregate::Median.code(), args)),
            Commands::Mode(args) => Some((Aggregate::Mode.code(), args)),
            Commands::Raw { code, vector } => Some((code, vector)),
        }
    }
}

#[derive(Args, Debug, Clone)]
struct VectorArgs {
    /// Values, comma or space separated
    #[arg(value_delimiter = ',', allow_negative_numbers = true)]
    values: Vec<i64>,

    /// Send N random values in 0..200 instead
    #[arg(short, long, conflicts_with = "values", value_parser = commands::parse_random_size)]
    random: Option<usize>,
}

impl VectorArgs {
    fn into_values(self) -> Vec<i64> {
        match self.random {
            Some(size) => commands::random_vector(size),
            None => self.values,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config =
        ConnectionConfig::new(cli.server).with_request_timeout(Duration::from_secs(cli.timeout));
    let client = Client::new(config);

    match cli.command.and_then(Commands::into_request) {
        None => {
            repl::run(client, cli.server).await?;
        }
        Some((code, args)) => {
            client.connect().await.map_err(|e| {
                eprintln!("{}: {}", "Connection failed".red(), e);
                e
            })?;

            let values = args.into_values();
            let outcome = commands::execute(&client, code, &values).await;
            let _ = client.close().await;

            let outcome = outcome.map_err(|e| {
                eprintln!("{}: {}", "Error".red(), e);
                e
            })?;
            println!("{}", outcome.render(cli.json)?);

            if outcome.is_error() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_flag_is_bounded() {
        let cli = Cli::try_parse_from(["vecstat-cli", "max", "--random", "10"]).unwrap();
        let Some(Commands::Max(args)) = cli.command else {
            panic!("expected max");
        };
        assert_eq!(args.random, Some(10));

        assert!(Cli::try_parse_from(["vecstat-cli", "max", "-r", "99999999999999"]).is_err());
        assert!(Cli::try_parse_from(["vecstat-cli", "min", "--random", "-1"]).is_err());
    }

    #[test]
    fn test_values_and_raw() {
        let cli = Cli::try_parse_from(["vecstat-cli", "raw", "9", "1,-2,3"]).unwrap();
        let (code, args) = cli.command.and_then(Commands::into_request).unwrap();
        assert_eq!(code, 9);
        assert_eq!(args.into_values(), vec![1, -2, 3]);
    }
}
