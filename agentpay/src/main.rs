use std::process::ExitCode;

use agentpay::{Config, Error, FetchOutcome, GuardContext, PaymentClient, RequestInit, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};

#[derive(Parser)]
#[command(author, version, about = "Pay-per-request HTTP client backed by a custody gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL, paying an x402 challenge if one comes back
    Fetch {
        url: String,
        /// HTTP method (defaults to POST when --data is given, GET otherwise)
        #[arg(short = 'X', long)]
        method: Option<String>,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
        /// Extra header, `Name: value` (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(HeaderName, HeaderValue)>,
        /// Most this request may cost, in USD
        #[arg(long)]
        max_cost: Option<f64>,
    },
    /// Show the delegated session, establishing one if needed
    Session,
}

fn parse_header(raw: &str) -> std::result::Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got '{}'", raw))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| e.to_string())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|e| e.to_string())?;
    Ok((name, value))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let config = Config::from_env()?;
    let client = PaymentClient::from_config(&config)?;

    match command {
        Commands::Fetch {
            url,
            method,
            data,
            headers,
            max_cost,
        } => {
            let method = match method {
                Some(m) => Method::from_bytes(m.to_uppercase().as_bytes())
                    .map_err(|e| Error::Config(format!("Invalid method '{}': {}", m, e)))?,
                None if data.is_some() => Method::POST,
                None => Method::GET,
            };

            let mut init = RequestInit {
                method,
                body: data.map(String::into_bytes),
                ..Default::default()
            };
            for (name, value) in headers {
                init.headers.append(name, value);
            }

            let guard = match max_cost {
                Some(cap) => GuardContext::max_cost_usd(cap),
                None => {
                    log::warn!("No --max-cost given; any price the server asks will be paid");
                    GuardContext::unlimited()
                }
            };

            let outcome = client.request(&url, &init, guard).await?;
            if let Some(receipt) = outcome.payment() {
                eprintln!(
                    "Paid {} to {} on {}",
                    agentpay::error::format_usd(receipt.cost_usd),
                    receipt.requirement.pay_to,
                    receipt.requirement.network
                );
                if let Some(tx) = receipt.settlement.as_ref().and_then(|s| s.transaction.as_deref()) {
                    eprintln!("Settlement transaction: {}", tx);
                }
            }
            if let FetchOutcome::Aborted(abort) = &outcome {
                log::warn!("Request aborted: {}", abort);
            }

            let response = outcome.into_response()?;
            eprintln!("HTTP {}", response.status());
            let body = response
                .text()
                .await
                .map_err(|e| Error::RemoteUnavailable { step: "read response body", source: e })?;
            println!("{}", body);
        }
        Commands::Session => {
            let wallet = client.wallet();
            let session = client
                .sessions()
                .get_session(&wallet.wallet_id, &wallet.address)
                .await?;
            let expires = Utc
                .timestamp_millis_opt(session.expires_at)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| session.expires_at.to_string());

            println!("Address:     {}", session.address);
            println!("Session:     {}", session.session_id);
            println!("Session key: {}", session.session_public_key);
            println!("Expires:     {}", expires);
        }
    }

    Ok(())
}
