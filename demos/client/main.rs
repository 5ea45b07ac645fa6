//! Standalone CLI client for exercising a running `mqless` broker.
//!
//! Mirrors the original `mqless_client` tool: posts one message to
//! `/send/{actor_type}/{actor_id}/{subject}` and prints the status code
//! and body of the reply. Lives outside `src/` — spec.md lists the
//! example client as an out-of-scope collaborator, so this is a thin
//! demo, not part of the library crate.

use clap::Parser;

/// Sends one message to a running mqless broker and prints the reply.
#[derive(Parser, Debug)]
#[command(name = "mqless-client")]
struct Args {
    /// Actor type (the target Lambda function name)
    actor_type: String,

    /// Actor id
    actor_id: String,

    /// Message subject
    subject: String,

    /// Message body, as a JSON literal (defaults to `null`)
    #[arg(default_value = "null")]
    body: String,

    /// Broker base URL
    #[arg(short = 's', long = "server", default_value = "http://127.0.0.1:34543")]
    server: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    let body: serde_json::Value = serde_json::from_str(&args.body)?;

    let url = format!(
        "{}/send/{}/{}/{}",
        args.server.trim_end_matches('/'),
        args.actor_type,
        args.actor_id,
        args.subject
    );
    println!("{url}");

    let client = reqwest::Client::new();
    let response = client.post(&url).json(&body).send().await?;

    let status = response.status();
    let text = response.text().await?;
    println!("Status Code: {}\n{}", status.as_u16(), text);

    if !status.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
