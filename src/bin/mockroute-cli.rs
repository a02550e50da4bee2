use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "mockroute-cli")]
#[command(about = "Control CLI for a running mockroute server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:2020")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show brokers, cookies, comments and settings
    State,
    /// Select a mock file on its route
    Select { file: String },
    /// Toggle the synthetic 500 on a route
    Toggle500 { method: String, url_mask: String },
    /// Turn the delay on or off for a route
    Delay {
        method: String,
        url_mask: String,
        #[arg(action = clap::ArgAction::Set)]
        delayed: bool,
    },
    /// Send a route to the proxy fallback, or back to its mocks
    Proxied {
        method: String,
        url_mask: String,
        #[arg(action = clap::ArgAction::Set)]
        proxied: bool,
    },
    /// Select, on every route, the mocks carrying a comment
    BulkSelect { comment: String },
    /// Select the cookie sent with mock responses
    Cookie { label: String },
    /// Set the proxy fallback; an empty string disables it
    Fallback { url: String },
    /// Rebuild the registry from disk
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/mockroute", cli.url.trim_end_matches('/'));

    let (endpoint, body) = match cli.command {
        Commands::State => {
            let res = client.get(format!("{base}/state")).send().await?;
            return print_response(res).await;
        }
        Commands::Select { file } => ("select", json!(file)),
        Commands::Toggle500 { method, url_mask } => {
            ("toggle500", json!({ "method": method, "urlMask": url_mask }))
        }
        Commands::Delay { method, url_mask, delayed } => (
            "delay",
            json!({ "method": method, "urlMask": url_mask, "value": delayed }),
        ),
        Commands::Proxied { method, url_mask, proxied } => (
            "proxied",
            json!({ "method": method, "urlMask": url_mask, "value": proxied }),
        ),
        Commands::BulkSelect { comment } => ("bulk-select-by-comment", json!(comment)),
        Commands::Cookie { label } => ("cookies", json!(label)),
        Commands::Fallback { url } => ("fallback", json!(url)),
        Commands::Reset => ("reset", Value::Null),
    };

    let res = client
        .patch(format!("{base}/{endpoint}"))
        .json(&body)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: control API returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", status),
    }
    Ok(())
}
