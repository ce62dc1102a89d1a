//! Spread grid dry-run harness
//!
//! Runs the strategy against a trader that only logs, fed by host events read
//! as JSON lines from stdin. Useful to check wiring and configuration before
//! plugging the strategy into a live host.
//!
//! ```bash
//! cargo run --bin grid_arb -- config.toml < events.jsonl
//! ```
//!
//! Each line is one event:
//!
//! ```json
//! {"exchange":"spot","type":"bbo","data":{"symbol":"BTC_USDT","bid_price":100.0,"ask_price":100.02,"timestamp":1700000000000}}
//! ```

use std::sync::Arc;

use log::{error, info, warn};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use spread_grid_arb::{
    Bbo, DryRunTrader, OrderUpdate, Position, Settings, SpreadGridStrategy, Strategy,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
enum HostEvent {
    Bbo(Bbo),
    Order(OrderUpdate),
    Position(Position),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    exchange: String,
    #[serde(flatten)]
    event: HostEvent,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let default_config = "config.toml".to_string();
    let config_path = args.get(1).unwrap_or(&default_config);
    if !std::path::Path::new(config_path).exists() {
        eprintln!("Config file '{}' not found. Please create one.", config_path);
        std::process::exit(1);
    }

    let settings = Settings::new(config_path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log.level))
        .init();

    let strategy = Arc::new(SpreadGridStrategy::new(
        settings.strategy,
        Arc::new(DryRunTrader::new()),
    )?);
    strategy.start().await?;
    for sub in strategy.subscribes() {
        info!("Subscribe account {}: {:?}", sub.account_id, sub.channels);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Envelope>(&line) {
                            Ok(envelope) => dispatch(&strategy, envelope).await,
                            Err(e) => warn!("Skipping malformed event: {}", e),
                        }
                    }
                    Ok(None) => {
                        info!("End of input");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    strategy.on_stop().await;
    Ok(())
}

async fn dispatch(strategy: &SpreadGridStrategy, envelope: Envelope) {
    match envelope.event {
        HostEvent::Bbo(bbo) => strategy.on_bbo(&envelope.exchange, &bbo).await,
        HostEvent::Order(update) => strategy.on_order(&envelope.exchange, &update).await,
        HostEvent::Position(position) => {
            strategy.on_position(&envelope.exchange, &position).await
        }
    }
}
