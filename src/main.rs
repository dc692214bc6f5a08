use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use clinic_cache::api::endpoints;
use clinic_cache::api::types::LoginRequest;
use clinic_cache::api::{EndpointRegistry, MutationEndpoint, QueryEndpoint};
use clinic_cache::cache::{QueryResult, QueryState, SubscribeOptions};
use clinic_cache::commands::{get_suggestions, parse_params, EndpointKind};
use clinic_cache::{logging, ClinicClient, Config};

#[derive(Parser, Debug)]
#[command(name = "clinic-cache")]
#[command(about = "Cached client for the clinic management API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/clinic-cache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL (overrides config and CLINIC_API_URL)
  #[arg(long)]
  api_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List declared endpoints
  Endpoints {
    /// Only show endpoints matching this text
    filter: Option<String>,
  },
  /// Run a query and print its result
  Query {
    name: String,
    /// Parameter as key=value (repeatable)
    #[arg(short, long = "param")]
    params: Vec<String>,
    /// Run the query twice and report where the second result came from
    #[arg(long)]
    twice: bool,
  },
  /// Run a mutation and report the invalidated tags
  Mutate {
    name: String,
    #[arg(short, long = "param")]
    params: Vec<String>,
    /// JSON object merged under the key=value params
    #[arg(long)]
    body: Option<String>,
  },
  /// Subscribe to a query and print every change until interrupted
  Watch {
    name: String,
    #[arg(short, long = "param")]
    params: Vec<String>,
    /// Polling interval in seconds
    #[arg(short, long, default_value_t = 30)]
    interval: u64,
  },
  /// Log in and print the bearer token
  Login {
    #[arg(long)]
    email: String,
    /// Read from CLINIC_API_PASSWORD when omitted
    #[arg(long)]
    password: Option<String>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?.with_api_url(args.api_url);
  let _log_guard = logging::init(&config.log)?;
  info!(api = %config.api.url, "Starting");

  let registry = endpoints::registry();
  let client = ClinicClient::from_config(&config)?;

  match args.command {
    Command::Endpoints { filter } => list_endpoints(&registry, filter.as_deref()),
    Command::Query {
      name,
      params,
      twice,
    } => {
      let endpoint = find_query(&registry, &name)?;
      let params = parse_params(&params, None)?;
      let result = client.layer().query(endpoint, params.clone()).await?;
      print_result(&result)?;
      if twice {
        let again = client.layer().query(endpoint, params).await?;
        println!("second read: {:?} (entry {})", again.source, again.entry_id);
      }
      let stats = client.layer().stats();
      info!(hits = stats.hits, misses = stats.misses, fetches = stats.fetches, "Done");
    }
    Command::Mutate { name, params, body } => {
      let endpoint = find_mutation(&registry, &name)?;
      let params = parse_params(&params, body.as_deref())?;
      let tags = endpoint.invalidated_tags(&params);
      let value = client.layer().mutate(endpoint, params).await?;
      println!("{}", serde_json::to_string_pretty(&value)?);
      let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
      println!("invalidated: [{}]", tags.join(", "));
    }
    Command::Watch {
      name,
      params,
      interval,
    } => {
      let endpoint = find_query(&registry, &name)?;
      let params = parse_params(&params, None)?;
      let options = SubscribeOptions::default().with_polling_interval(Duration::from_secs(interval.max(1)));
      let mut subscription = client.layer().subscribe(endpoint, params, options)?;

      loop {
        tokio::select! {
          state = subscription.changed() => match state {
            Some(QueryState::Success(result)) => print_result(&result)?,
            Some(QueryState::Error(e)) => eprintln!("error: {}", e),
            Some(_) => {}
            None => break,
          },
          _ = tokio::signal::ctrl_c() => break,
        }
      }
    }
    Command::Login { email, password } => {
      let password = match password {
        Some(p) => p,
        None => std::env::var("CLINIC_API_PASSWORD")
          .map_err(|_| eyre!("Password not given. Pass --password or set CLINIC_API_PASSWORD."))?,
      };
      let data = client.login(&LoginRequest { email, password }).await?;
      println!("Logged in as {} ({})", data.user.name, data.user.role);
      println!("export CLINIC_API_TOKEN={}", data.token);
    }
  }

  Ok(())
}

fn list_endpoints(registry: &EndpointRegistry, filter: Option<&str>) {
  for suggestion in get_suggestions(registry, filter.unwrap_or(""), None) {
    let kind = match suggestion.kind {
      EndpointKind::Query => "query",
      EndpointKind::Mutation => "mutation",
    };
    println!("{:<8} {:<30} {}", kind, suggestion.name, suggestion.description);
  }
}

fn find_query(registry: &EndpointRegistry, name: &str) -> Result<&'static QueryEndpoint> {
  registry
    .query(name)
    .ok_or_else(|| unknown(registry, name, EndpointKind::Query))
}

fn find_mutation(registry: &EndpointRegistry, name: &str) -> Result<&'static MutationEndpoint> {
  registry
    .mutation(name)
    .ok_or_else(|| unknown(registry, name, EndpointKind::Mutation))
}

fn unknown(registry: &EndpointRegistry, name: &str, kind: EndpointKind) -> color_eyre::Report {
  let suggestions: Vec<&str> = get_suggestions(registry, name, Some(kind))
    .into_iter()
    .take(3)
    .map(|s| s.name)
    .collect();
  if suggestions.is_empty() {
    eyre!("Unknown {:?} endpoint: {}", kind, name)
  } else {
    eyre!(
      "Unknown {:?} endpoint: {}. Did you mean: {}?",
      kind,
      name,
      suggestions.join(", ")
    )
  }
}

fn print_result(result: &QueryResult) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(result.data.as_ref())?);
  let tags: Vec<String> = result.tags.iter().map(|t| t.to_string()).collect();
  eprintln!(
    "entry {} from {:?} at {}, tags: [{}]",
    result.entry_id,
    result.source,
    result.fetched_at.format("%H:%M:%S"),
    tags.join(", ")
  );
  Ok(())
}
