//! lightsc shell - drive lightsd from a terminal
//!
//! Connects to a running lightsd and reads one command per line from stdin.
//! Results are printed as pretty JSON; errors are printed and the shell keeps
//! going, except when the connection itself is gone.
//!
//! # Usage
//!
//! ```bash
//! lightsc-shell localhost 1234
//!
//! lightsc> power_on *
//! lightsc> hsbk #kitchen 30 0.6 0.8 3500 600
//! lightsc> batch
//! lightsc> power_off bulb1
//! lightsc> toggle bulb2,bulb3
//! lightsc> end
//! ```
//!
//! A target is a selector (`*`, `#tag`, a label or a device address) or
//! several selectors separated by commas.
//!
//! # Logging
//!
//! Logs go to stderr, filtered by `RUST_LOG` or `--log-level`.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use lightsc_client::{BatchResults, Call, ClientBuilder, LightsClient, Target};
use lightsc_core::Error;
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive shell for lightsd", long_about = None)]
struct Args {
    /// The hostname or IP address lightsd is listening on
    host: String,

    /// The port lightsd is listening on
    port: u16,

    /// Give up on a reply after this many milliseconds (0 waits forever)
    #[arg(long, default_value_t = 30_000)]
    read_timeout_ms: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// One line of shell input
#[derive(Debug, Clone, PartialEq)]
enum Command {
    PowerOn(Target),
    PowerOff(Target),
    Toggle(Target),
    State(Target),
    Hsbk {
        target: Target,
        hue: f64,
        saturation: f64,
        brightness: f64,
        kelvin: u16,
        duration_ms: u32,
    },
    Brightness(Target, f64),
    Tag(Target, String),
    Untag(Target, String),
    Label(Target, String),
    Batch,
    End,
    Help,
    Quit,
}

const HELP: &str = "\
commands:
  power_on TARGET                  turn bulbs on
  power_off TARGET                 turn bulbs off
  toggle TARGET                    toggle power
  state TARGET                     show bulb state
  hsbk TARGET H S B K [MS]         set color, optionally fading over MS
  brightness TARGET DELTA          shift brightness by DELTA (-1.0 to 1.0)
  tag TARGET TAG                   add TAG to bulbs
  untag TARGET TAG                 remove TAG from bulbs
  label TARGET LABEL               rename bulbs
  batch                            queue the following commands
  end                              send queued commands
  help                             show this help
  quit                             leave the shell

TARGET is *, #tag, a label or an address; separate several with commas";

fn parse_target(raw: &str) -> Target {
    if raw.contains(',') {
        Target::Many(
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    } else {
        Target::from(raw)
    }
}

fn parse_number<N: std::str::FromStr>(name: &str, raw: &str) -> Result<N> {
    raw.parse()
        .map_err(|_| anyhow!("{} must be a number, got {:?}", name, raw))
}

impl Command {
    /// Parse a line; `Ok(None)` for blank lines
    fn parse(line: &str) -> Result<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Ok(None);
        };

        let arity = |expected: &[usize]| -> Result<()> {
            if expected.contains(&args.len()) {
                Ok(())
            } else {
                bail!("wrong number of arguments for {}, try help", name)
            }
        };

        let command = match name {
            "power_on" => {
                arity(&[1])?;
                Command::PowerOn(parse_target(args[0]))
            }
            "power_off" => {
                arity(&[1])?;
                Command::PowerOff(parse_target(args[0]))
            }
            "toggle" | "power_toggle" => {
                arity(&[1])?;
                Command::Toggle(parse_target(args[0]))
            }
            "state" => {
                arity(&[1])?;
                Command::State(parse_target(args[0]))
            }
            "hsbk" => {
                arity(&[5, 6])?;
                Command::Hsbk {
                    target: parse_target(args[0]),
                    hue: parse_number("hue", args[1])?,
                    saturation: parse_number("saturation", args[2])?,
                    brightness: parse_number("brightness", args[3])?,
                    kelvin: parse_number("kelvin", args[4])?,
                    duration_ms: match args.get(5) {
                        Some(raw) => parse_number("duration", raw)?,
                        None => 0,
                    },
                }
            }
            "brightness" => {
                arity(&[2])?;
                Command::Brightness(parse_target(args[0]), parse_number("delta", args[1])?)
            }
            "tag" => {
                arity(&[2])?;
                Command::Tag(parse_target(args[0]), args[1].to_string())
            }
            "untag" => {
                arity(&[2])?;
                Command::Untag(parse_target(args[0]), args[1].to_string())
            }
            "label" => {
                arity(&[2])?;
                Command::Label(parse_target(args[0]), args[1].to_string())
            }
            "batch" => Command::Batch,
            "end" => Command::End,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command {:?}, try help", other),
        };
        Ok(Some(command))
    }
}

fn print_value(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_call(call: Call) -> Result<()> {
    match call {
        Call::Completed(value) => print_value(&value),
        Call::Queued(id) => {
            println!("queued {}", id);
            Ok(())
        }
    }
}

fn print_batch(results: &BatchResults) -> Result<()> {
    for entry in results {
        match &entry.outcome {
            Ok(value) => println!("{} {}: {}", entry.method, entry.id, serde_json::to_string(value)?),
            Err(e) => println!("{} {}: error {}", entry.method, entry.id, e),
        }
    }
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

async fn execute(client: &mut LightsClient, command: Command) -> lightsc_core::Result<Flow> {
    let call = match command {
        Command::PowerOn(target) => client.power_on(target).await?,
        Command::PowerOff(target) => client.power_off(target).await?,
        Command::Toggle(target) => client.power_toggle(target).await?,
        Command::State(target) => client.get_light_state(target).await?,
        Command::Hsbk {
            target,
            hue,
            saturation,
            brightness,
            kelvin,
            duration_ms,
        } => {
            client
                .set_light_from_hsbk(target, hue, saturation, brightness, kelvin, duration_ms)
                .await?
        }
        Command::Brightness(target, delta) => {
            let outcomes = client.adjust_brightness(target, delta).await?;
            let results = outcomes
                .into_iter()
                .map(|outcome| match outcome {
                    Ok(value) => value,
                    Err(error) => json!({ "error": error }),
                })
                .collect();
            Call::Completed(Value::Array(results))
        }
        Command::Tag(target, tag) => client.tag(target, &tag).await?,
        Command::Untag(target, tag) => client.untag(target, &tag).await?,
        Command::Label(target, label) => client.set_label(target, &label).await?,
        Command::Batch => {
            client.begin_batch()?;
            println!("batching, send with end");
            return Ok(Flow::Continue);
        }
        Command::End => {
            let results = client.end_batch().await?;
            if let Err(e) = print_batch(&results) {
                tracing::error!(error = %e, "Failed to print batch results");
            }
            return Ok(Flow::Continue);
        }
        Command::Help => {
            println!("{}", HELP);
            return Ok(Flow::Continue);
        }
        Command::Quit => return Ok(Flow::Quit),
    };

    if let Err(e) = print_call(call) {
        tracing::error!(error = %e, "Failed to print result");
    }
    Ok(Flow::Continue)
}

fn prompt(client: &LightsClient) -> Result<()> {
    if client.is_batching() {
        print!("lightsc[{}]> ", client.pending_len());
    } else {
        print!("lightsc> ");
    }
    std::io::stdout().flush().context("Failed to write prompt")
}

async fn run(mut client: LightsClient) -> Result<()> {
    println!("Connected to lightsd@{}, type help for commands", client.peer());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&client)?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            println!();
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match execute(&mut client, command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e @ Error::Connection(_)) => {
                client.close().await.ok();
                bail!("{}", e);
            }
            Err(e) => eprintln!("error: {}", e),
        }
    }

    if client.is_batching() {
        eprintln!("discarding {} queued commands", client.pending_len());
    }
    client.close().await.context("Failed to close connection")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    lightsc_core::init_logging(&args.log_level).map_err(|e| anyhow!(e))?;

    let read_timeout = (args.read_timeout_ms > 0).then(|| Duration::from_millis(args.read_timeout_ms));
    let client = match ClientBuilder::new(args.host.as_str(), args.port)
        .read_timeout(read_timeout)
        .connect()
        .await
    {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!(error = %e, "Connection failed");
            eprintln!(
                "Couldn't connect to lightsd@{}:{}, is it running? ({})",
                args.host, args.port, e
            );
            std::process::exit(1);
        }
    };

    run(client).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blank() {
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("   \t").unwrap(), None);
    }

    #[test]
    fn test_parse_power() {
        assert_eq!(
            Command::parse("power_on *").unwrap(),
            Some(Command::PowerOn(Target::all()))
        );
        assert_eq!(
            Command::parse("toggle bulb1,#kitchen").unwrap(),
            Some(Command::Toggle(Target::from(vec!["bulb1", "#kitchen"])))
        );
    }

    #[test]
    fn test_parse_hsbk() {
        assert_eq!(
            Command::parse("hsbk #kitchen 30 0.6 0.8 3500").unwrap(),
            Some(Command::Hsbk {
                target: Target::tag("kitchen"),
                hue: 30.0,
                saturation: 0.6,
                brightness: 0.8,
                kelvin: 3500,
                duration_ms: 0,
            })
        );

        match Command::parse("hsbk * 0 0 1 2700 600").unwrap() {
            Some(Command::Hsbk { duration_ms, .. }) => assert_eq!(duration_ms, 600),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_tags_and_labels() {
        assert_eq!(
            Command::parse("tag bulb1 porch").unwrap(),
            Some(Command::Tag(Target::from("bulb1"), "porch".to_string()))
        );
        assert_eq!(
            Command::parse("label d073d501a0d5 desk").unwrap(),
            Some(Command::Label(Target::from("d073d501a0d5"), "desk".to_string()))
        );
    }

    #[test]
    fn test_parse_brightness() {
        assert_eq!(
            Command::parse("brightness * -0.2").unwrap(),
            Some(Command::Brightness(Target::all(), -0.2))
        );
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(Command::parse("batch").unwrap(), Some(Command::Batch));
        assert_eq!(Command::parse("end").unwrap(), Some(Command::End));
        assert_eq!(Command::parse("help").unwrap(), Some(Command::Help));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("power_on").is_err());
        assert!(Command::parse("hsbk * 1 2 3").is_err());
        assert!(Command::parse("hsbk * red 1 1 3500").is_err());
        assert!(Command::parse("dance *").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from(["lightsc-shell", "localhost", "1234"]);
        assert_eq!(args.host, "localhost");
        assert_eq!(args.port, 1234);
        assert_eq!(args.read_timeout_ms, 30_000);

        let args =
            Args::parse_from(["lightsc-shell", "10.0.0.5", "4000", "--read-timeout-ms", "0"]);
        assert_eq!(args.read_timeout_ms, 0);
    }
}
