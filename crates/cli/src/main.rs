use std::io::{self, Write};

use anyhow::Result;
use clap::{Parser, Subcommand};
use rentscope_agents::{Config, RentAgent};
use rentscope_core::{QueryInput, ResultEnvelope};
use rentscope_dataset::DatasetProvider;
use rentscope_llm::{GeneratorKind, HttpGenerator, StaticGenerator};
use rentscope_observability::{init_tracing, AppMetrics};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "rentscope")]
#[command(about = "RentScope rent and affordability assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer one query (supports ':: key=value' and 'prefs={...}' tails)
    Query {
        text: String,
        #[arg(long)]
        json: bool,
    },
    /// Interactive loop sharing one session id
    Chat,
    /// Run the built-in tool self-test against the snapshot
    Selftest,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("rentscope_cli");
    let cli = Cli::parse();

    let config = Config::from_env();
    let agent = build_agent(&config).await?;

    match cli.command {
        Command::Query { text, json } => {
            let envelope = agent
                .handle_query(QueryInput {
                    text,
                    session_id: config.session_id.clone(),
                })
                .await?;
            print_envelope(&envelope, json)?;
        }
        Command::Chat => run_chat(agent, config.session_id.clone()).await?,
        Command::Selftest => {
            let report = agent.selftest();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report["ok"].as_bool().unwrap_or(false) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn build_agent(config: &Config) -> Result<RentAgent> {
    let provider = match (&config.data_url, config.live_mode) {
        (Some(url), true) => DatasetProvider::from_remote_or_local(url, &config.data_path).await?,
        _ => DatasetProvider::from_local(&config.data_path)?,
    };

    let generator = match &config.model_url {
        Some(url) => GeneratorKind::Http(HttpGenerator::new(url.clone(), config.model_id.clone())),
        None => GeneratorKind::Static(StaticGenerator::offline()),
    };

    Ok(RentAgent::new(
        config,
        provider,
        generator,
        AppMetrics::shared(),
    ))
}

fn print_envelope(envelope: &ResultEnvelope, full_json: bool) -> Result<()> {
    if full_json {
        println!("{}", serde_json::to_string_pretty(envelope)?);
        return Ok(());
    }

    println!("PLAN:");
    println!("{}", envelope.plan);
    println!("\nRESULT:");
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "actions": envelope.actions,
            "verify": envelope.verify,
            "answer": envelope.answer,
        }))?
    );
    if let Some(meta) = &envelope.meta {
        println!("\nMETA:");
        println!("{}", serde_json::to_string_pretty(meta)?);
    }
    Ok(())
}

async fn run_chat(agent: RentAgent, configured_session: Option<String>) -> Result<()> {
    let session_id = configured_session.unwrap_or_else(|| Uuid::new_v4().to_string());

    println!("RentScope chat mode. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().read_line(&mut line)?;

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let envelope = agent
            .handle_query(QueryInput {
                text: message.to_string(),
                session_id: Some(session_id.clone()),
            })
            .await?;

        print_envelope(&envelope, false)?;
        println!();
    }

    Ok(())
}
