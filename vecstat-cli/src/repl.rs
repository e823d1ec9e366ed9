//! Interactive REPL.

use crate::commands;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::net::SocketAddr;
use vecstat_client::Client;
use vecstat_core::Aggregate;

const HELP_TEXT: &str = r#"
Available commands:
  help                          Show this help

  <command>, <size>             Send <size> random values in 0..200
                                (1 - max, 2 - min, 3 - median, 4 - trend)

  max <v1> <v2> ...             Largest value
  min <v1> <v2> ...             Smallest value
  median <v1> <v2> ...          Upper-middle value
  mode <v1> <v2> ...            Most frequent value (alias: trend)
  <aggregate> random <size>     Aggregate over <size> random values
  raw <code> <v1> <v2> ...      Send an arbitrary command code

  quit, exit                    Exit the REPL
"#;

/// Where the values of a request come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Values {
    Given(Vec<i64>),
    Random(usize),
}

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Help,
    Quit,
    Request { code: i64, values: Values },
}

pub async fn run(client: Client, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "vecstat CLI".bold().cyan());
    println!("Connecting to {}...", addr);

    client.connect().await?;
    println!("{}", "Connected!".green());

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".vecstat_history"))
        .unwrap_or_else(|_| ".vecstat_history".into());
    let _ = rl.load_history(&history_path);

    println!("Input in format `command, size` or `max 3 7 2`.");
    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "vecstat>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let command = match parse_line(line) {
                    Ok(command) => command,
                    Err(msg) => {
                        println!("{}: {}\n", "Wrong input".red(), msg);
                        continue;
                    }
                };

                match command {
                    ReplCommand::Help => println!("{}", HELP_TEXT),
                    ReplCommand::Quit => break,
                    ReplCommand::Request { code, values } => {
                        let values = match values {
                            Values::Given(values) => values,
                            Values::Random(size) => {
                                let values = commands::random_vector(size);
                                println!("{:?}", values);
                                values
                            }
                        };

                        match commands::execute(&client, code, &values).await {
                            Ok(outcome) => match outcome.render(false) {
                                Ok(text) => println!("{}\n", text),
                                Err(e) => println!("{}: {}\n", "Error".red(), e),
                            },
                            Err(e) => {
                                println!("{}: {}\n", "Error".red(), e);
                                if !client.is_connected() {
                                    println!("{}", "Reconnecting...".dimmed());
                                    if let Err(e) = client.connect().await {
                                        println!("{}: {}", "Connection failed".red(), e);
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);

    let _ = client.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

fn parse_line(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();

    if let Some((command, size)) = line.split_once(',') {
        // `command, size` only when both sides are plain integers; anything
        // else falls through to the named forms (`max 1,2,3`).
        if let (Ok(code), Ok(_)) = (command.trim().parse::<i64>(), size.trim().parse::<i64>()) {
            let size = commands::parse_random_size(size)?;
            return Ok(ReplCommand::Request {
                code,
                values: Values::Random(size),
            });
        }
    }

    let parts: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();
    let Some((head, args)) = parts.split_first() else {
        return Err("empty input".to_string());
    };

    match head.to_lowercase().as_str() {
        "help" | "?" => Ok(ReplCommand::Help),
        "quit" | "exit" | "q" => Ok(ReplCommand::Quit),
        "raw" => {
            let (code, rest) = args.split_first().ok_or("usage: raw <code> <values...>")?;
            let code = code
                .parse::<i64>()
                .map_err(|_| format!("invalid command code '{}'", code))?;
            Ok(ReplCommand::Request {
                code,
                values: parse_values(rest)?,
            })
        }
        name => {
            let aggregate = name.parse::<Aggregate>()?;
            Ok(ReplCommand::Request {
                code: aggregate.code(),
                values: parse_values(args)?,
            })
        }
    }
}

fn parse_values(args: &[&str]) -> Result<Values, String> {
    if let ["random" | "-r", size] = args {
        return Ok(Values::Random(commands::parse_random_size(size)?));
    }

    args.iter()
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| format!("invalid value '{}'", s))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Values::Given)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_size() {
        assert_eq!(
            parse_line("1, 10").unwrap(),
            ReplCommand::Request {
                code: 1,
                values: Values::Random(10)
            }
        );
        assert_eq!(
            parse_line(" 9 ,0 ").unwrap(),
            ReplCommand::Request {
                code: 9,
                values: Values::Random(0)
            }
        );
        assert!(parse_line("1, -4").is_err());
    }

    #[test]
    fn test_random_size_is_bounded() {
        let err = parse_line("1, 99999999999999").unwrap_err();
        assert!(err.contains("must not exceed"));
        assert!(parse_line("max random 99999999999999").is_err());
        assert!(parse_line(&format!("2, {}", vecstat_protocol::MAX_VECTOR_LEN + 1)).is_err());
        assert_eq!(
            parse_line(&format!("2, {}", vecstat_protocol::MAX_VECTOR_LEN)).unwrap(),
            ReplCommand::Request {
                code: 2,
                values: Values::Random(vecstat_protocol::MAX_VECTOR_LEN)
            }
        );
    }

    #[test]
    fn test_parse_named() {
        assert_eq!(
            parse_line("max 3 7 2").unwrap(),
            ReplCommand::Request {
                code: 1,
                values: Values::Given(vec![3, 7, 2])
            }
        );
        assert_eq!(
            parse_line("Trend 1,1,-2").unwrap(),
            ReplCommand::Request {
                code: 4,
                values: Values::Given(vec![1, 1, -2])
            }
        );
        assert_eq!(
            parse_line("median random 25").unwrap(),
            ReplCommand::Request {
                code: 3,
                values: Values::Random(25)
            }
        );
        assert_eq!(
            parse_line("min").unwrap(),
            ReplCommand::Request {
                code: 2,
                values: Values::Given(vec![])
            }
        );
    }

    #[test]
    fn test_parse_raw() {
        assert_eq!(
            parse_line("raw 9 1 2").unwrap(),
            ReplCommand::Request {
                code: 9,
                values: Values::Given(vec![1, 2])
            }
        );
        assert!(parse_line("raw").is_err());
        assert!(parse_line("raw x 1").is_err());
    }

    #[test]
    fn test_parse_meta_and_errors() {
        assert_eq!(parse_line("help").unwrap(), ReplCommand::Help);
        assert_eq!(parse_line("EXIT").unwrap(), ReplCommand::Quit);
        assert!(parse_line("avg 1 2").is_err());
        assert!(parse_line("max 1 two").is_err());
    }
}
