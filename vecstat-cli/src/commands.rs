//! Command execution.

use colored::Colorize;
use rand::Rng;
use serde::Serialize;
use vecstat_client::{Client, ClientError};
use vecstat_core::Aggregate;
use vecstat_protocol::MAX_VECTOR_LEN;

/// Exclusive upper bound of generated random values.
pub const RANDOM_VALUE_BOUND: i64 = 200;

/// Result of one request, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub command: i64,
    pub name: Option<&'static str>,
    pub count: usize,
    pub status: &'static str,
    pub result: Option<i64>,
}

impl Outcome {
    fn new(command: i64, count: usize, result: Option<i64>) -> Self {
        Self {
            command,
            name: Aggregate::try_from(command).ok().map(|a| a.name()),
            count,
            status: if result.is_some() { "ok" } else { "error" },
            result,
        }
    }

    pub fn is_error(&self) -> bool {
        self.result.is_none()
    }

    /// Formats the outcome for the terminal, or as a JSON object.
    pub fn render(&self, json: bool) -> Result<String, serde_json::Error> {
        if json {
            return serde_json::to_string(self);
        }

        let label = self.name.unwrap_or("unknown");
        Ok(match self.result {
            Some(value) => format!(
                "{} = {} ({} value(s))",
                label.cyan(),
                value.to_string().green().bold(),
                self.count
            ),
            None => format!(
                "{} for command {} ({} value(s))",
                "Error from server".red(),
                self.command,
                self.count
            ),
        })
    }
}

/// Sends one request. An error status is a normal outcome, not an `Err`.
pub async fn execute(
    client: &Client,
    command: i64,
    values: &[i64],
) -> Result<Outcome, ClientError> {
    tracing::debug!("Sending command {} with {} value(s)", command, values.len());
    match client.raw(command, values).await {
        Ok(result) => Ok(Outcome::new(command, values.len(), Some(result))),
        Err(ClientError::ServerError { .. }) => Ok(Outcome::new(command, values.len(), None)),
        Err(e) => Err(e),
    }
}

/// Parses a random vector size, capped at the largest vector a default
/// server accepts.
pub fn parse_random_size(s: &str) -> Result<usize, String> {
    let size = s
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid size '{}'", s.trim()))?;
    let size = usize::try_from(size).map_err(|_| "size must not be negative".to_string())?;
    if size > MAX_VECTOR_LEN {
        return Err(format!("size must not exceed {}", MAX_VECTOR_LEN));
    }
    Ok(size)
}

/// Generates `size` random values in `0..RANDOM_VALUE_BOUND`.
pub fn random_vector(size: usize) -> Vec<i64> {
    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| rng.gen_range(0..RANDOM_VALUE_BOUND))
        .collect()
}
