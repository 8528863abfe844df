use std::env;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use precedent_core::config::Config;

const USAGE: &str = "Usage: precedent <search|get|ping> [args...]
  search \"<situation>\" [--k N]   most similar precedents
  get <case_no>                  full precedent by case number
  ping                           check the index backend";

enum Command {
    Search { situation: String, k: Option<usize> },
    Get { case_no: String },
    Ping,
}

fn parse_args(mut args: Vec<String>) -> anyhow::Result<Command> {
    if args.is_empty() {
        bail!("{USAGE}");
    }
    let cmd = args.remove(0);
    match cmd.as_str() {
        "search" => {
            let mut situation = None;
            let mut k = None;
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--k" | "-k" => {
                        let value = args.get(i + 1).context("--k requires a number")?;
                        k = Some(value.parse::<usize>().with_context(|| format!("--k requires a number, got '{value}'"))?);
                        i += 1;
                    }
                    other if situation.is_none() => situation = Some(other.to_string()),
                    other => bail!("unexpected argument '{other}'\n{USAGE}"),
                }
                i += 1;
            }
            let situation = situation.filter(|s| !s.trim().is_empty()).context("search requires a situation text")?;
            Ok(Command::Search { situation, k })
        }
        "get" => {
            let case_no = args.first().cloned().context("get requires a case number")?;
            Ok(Command::Get { case_no })
        }
        "ping" => Ok(Command::Ping),
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    let command = parse_args(env::args().skip(1).collect())?;
    let settings = Config::load()?.settings().context("loading settings")?;
    info!(backend = ?settings.index.backend, chunk_index = %settings.index.chunk_index_name, "settings loaded");
    let search = precedent_retrieval::from_settings(&settings).await?;

    match command {
        Command::Search { situation, k } => {
            let results = search.search_text(&situation, k).await?;
            info!(returned = results.len(), "search finished");
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Get { case_no } => match search.get_precedent_by_case_number(&case_no).await? {
            Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
            None => {
                eprintln!("No precedent with case number {case_no}");
                std::process::exit(1);
            }
        },
        Command::Ping => {
            if search.check_connection().await {
                println!("ok");
            } else {
                eprintln!("index backend unreachable at {}", settings.index.url);
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
