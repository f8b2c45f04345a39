use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "circuit-cli")]
#[command(about = "Command-line client for the circuit health service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// API key for admin commands.
    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// List environments with their health
    Envs,
    /// Show the current snapshot of an environment
    Snapshot {
        env: String,
        /// Number of recent transitions to include
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show transition history of an environment or one entity
    History {
        env: String,
        entity: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Report an observation for an entity
    Observe {
        env: String,
        entity: String,
        #[arg(long)]
        error_rate: Option<f64>,
        #[arg(long)]
        failures: Option<u64>,
        #[arg(long)]
        successes: Option<u64>,
        #[arg(long)]
        latency_ms: Option<u64>,
        #[arg(long)]
        error: Option<String>,
    },
    /// Force an entity Closed and zero its counters
    Reset { env: String, entity: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/api/v1", cli.url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)).send().await?,
        Commands::Envs => client.get(format!("{}/environments", base)).send().await?,
        Commands::Snapshot { env, limit } => {
            client
                .get(format!("{}/environments/{}/snapshot", base, env))
                .query(&limit_query(limit))
                .send()
                .await?
        }
        Commands::History { env, entity, limit } => {
            let url = match entity {
                Some(entity) => format!("{}/environments/{}/entities/{}/transitions", base, env, entity),
                None => format!("{}/environments/{}/transitions", base, env),
            };
            client.get(url).query(&limit_query(limit)).send().await?
        }
        Commands::Observe {
            env,
            entity,
            error_rate,
            failures,
            successes,
            latency_ms,
            error,
        } => {
            let mut body = Map::new();
            insert(&mut body, "error_rate", error_rate.map(|v| json!(v)));
            insert(&mut body, "failures", failures.map(|v| json!(v)));
            insert(&mut body, "successes", successes.map(|v| json!(v)));
            insert(&mut body, "latency_ms", latency_ms.map(|v| json!(v)));
            insert(&mut body, "error", error.map(Value::String));
            client
                .post(format!("{}/environments/{}/entities/{}/observations", base, env, entity))
                .json(&Value::Object(body))
                .send()
                .await?
        }
        Commands::Reset { env, entity } => {
            client
                .post(format!("{}/environments/{}/entities/{}/reset", base, env, entity))
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

fn limit_query(limit: Option<usize>) -> Vec<(&'static str, usize)> {
    limit.map(|l| vec![("limit", l)]).unwrap_or_default()
}

fn insert(body: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        body.insert(key.to_string(), value);
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
