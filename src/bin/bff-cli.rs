use std::io::Write;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "bff-cli")]
#[command(about = "Operator CLI for a running tutor-bff", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and stream the answer events to stdout
    Chat {
        question: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Fork another user's session
    Fork {
        session: String,
        #[arg(long)]
        user: String,
    },
    /// Show, update or clear scenario progress
    Progress {
        session: String,
        #[arg(long)]
        step: Option<u32>,
        #[arg(long)]
        complete: bool,
        #[arg(long, conflicts_with_all = ["step", "complete"])]
        clear: bool,
    },
    /// Look up a page's meta description
    Meta { page: String },
    /// Show where the frontend would send API calls
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Chat {
            question,
            user,
            conversation,
        } => {
            let res = client
                .post(format!("{base}/api/proxy/chat"))
                .json(&json!({
                    "question": question,
                    "userId": user,
                    "conversationId": conversation,
                }))
                .send()
                .await?;
            stream_response(res).await?;
        }
        Commands::Fork { session, user } => {
            let res = client
                .post(format!("{base}/api/chat-sessions/fork"))
                .json(&json!({ "sessionId": session, "userId": user }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Progress {
            session,
            step,
            complete,
            clear,
        } => {
            let url = format!("{base}/api/chat-sessions/{session}/scenario-progress");
            let res = if clear {
                client.delete(&url).send().await?
            } else if step.is_some() || complete {
                let mut update = Map::new();
                if let Some(step) = step {
                    update.insert("current_step".into(), json!(step));
                }
                if complete {
                    update.insert("completed".into(), json!(true));
                }
                client.put(&url).json(&Value::Object(update)).send().await?
            } else {
                client.get(&url).send().await?
            };
            print_response(res).await?;
        }
        Commands::Meta { page } => {
            let res = client
                .get(format!("{base}/api/proxy/meta-description"))
                .query(&[("url", page)])
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Config => {
            let res = client.get(format!("{base}/api/client-config")).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn check_status(status: reqwest::StatusCode, body: &str) -> Result<(), Box<dyn std::error::Error>> {
    if status.is_success() {
        return Ok(());
    }
    Err(format!("server returned {status}: {body}").into())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    check_status(status, &text)?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}

async fn stream_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return check_status(status, &text);
    }

    let mut stdout = std::io::stdout().lock();
    let mut body = res.bytes_stream();
    while let Some(chunk) = body.next().await {
        stdout.write_all(&chunk?)?;
        stdout.flush()?;
    }
    Ok(())
}
