use std::env;
use std::sync::Arc;
use std::time::Duration;

use connector_bitfinex::{BitfinexStream, StreamConfig};
use log::{error, info};
use market_state::MarketStore;

fn print_usage() {
    eprintln!("Usage: bitfinex_stream [--config <config.json>] [--report-secs <n>]");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<String> = None;
    let mut report_secs = 10u64;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--report-secs" if i + 1 < args.len() => {
                report_secs = args[i + 1].parse()?;
                i += 2;
            }
            _ => {
                print_usage();
                return Ok(());
            }
        }
    }

    let config = match config_path {
        Some(path) => StreamConfig::from_json_file(path)?,
        None => StreamConfig::from_env()?,
    };
    info!("tracking {:?} on {}", config.symbols, config.url);

    let store = Arc::new(MarketStore::new(config.symbol_table(), 1024));
    let mut stream = BitfinexStream::new(config, store.clone())?;
    let status = stream.status();

    let reporter = tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(report_secs.max(1)));
        loop {
            tick.tick().await;
            for (_, symbol) in store.symbols().iter() {
                match store.tips(symbol) {
                    Some(tips) => info!(
                        "{} bid {} x {} | ask {} x {} (online: {})",
                        symbol,
                        tips.bid.price,
                        tips.bid.amount,
                        tips.ask.price,
                        tips.ask.amount,
                        status.is_online()
                    ),
                    None => info!("{} waiting for book (online: {})", symbol, status.is_online()),
                }
            }
        }
    });

    let result = tokio::select! {
        res = stream.run() => res,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    };
    reporter.abort();
    stream.close().await;

    if let Err(e) = result {
        error!("{}", e);
        return Err(e.into());
    }
    Ok(())
}
