use bandwatch_data::{
    CandleStore, DataError,
    backfill::backfill,
    config::ScannerConfig,
    exchange::binance::{combined_kline_stream_url, rest::BinanceRestClient},
    metric::engine::MetricEngine,
    notify::LogNotifier,
    pipeline::Pipeline,
    streams::client::StreamingClient,
    symbols::select_symbols,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(error) = run().await {
        error!(%error, "scanner terminated");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), DataError> {
    let config = ScannerConfig::from_env()?;
    info!(?config, "starting bandwatch scanner");

    let rest = BinanceRestClient::new()?;
    let (symbols, symbol_update) =
        select_symbols(&rest, config.market, &config.quote_asset, config.top_symbols).await?;
    if symbols.is_empty() {
        return Err(DataError::Config(format!(
            "no {} symbols quoted in {}",
            config.market, config.quote_asset
        )));
    }

    let store = Arc::new(CandleStore::new(config.max_candles));
    let engine = Arc::new(MetricEngine::new(config.metric_config(), Arc::clone(&store)));
    let pipeline = Pipeline::spawn(
        config.market,
        Arc::clone(&store),
        engine,
        Arc::new(LogNotifier),
        config.queue_capacity,
    );
    pipeline.publish(symbol_update).await?;

    let intervals = config.intervals();
    let url = combined_kline_stream_url(config.market, &symbols, &intervals)?;
    let client = StreamingClient::new(config.stream_config(url), pipeline.handler());
    client.start();

    // Live updates start flowing while history is fetched
    let interrupted = tokio::select! {
        summary = backfill(&rest, &store, config.market, &symbols, &intervals, config.backfill_pacing) => {
            if !summary.is_complete() {
                warn!(failed = ?summary.failed.keys().collect::<Vec<_>>(), "backfill incomplete");
            }
            for event in summary.events {
                pipeline.publish(event).await?;
            }
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if !interrupted {
        info!(series = store.bucket_count(), "scanning, press Ctrl-C to stop");
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to listen for Ctrl-C");
        }
    }

    info!("shutting down");
    client.stop().await;
    drop(client);
    pipeline.join().await;

    Ok(())
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
