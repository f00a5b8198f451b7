use clap::Parser;
use std::sync::Arc;
use wavebot::clock::SystemClock;
use wavebot::config::Settings;
use wavebot::execution::LifecycleController;
use wavebot::gateway::BinanceFuturesGateway;
use wavebot::strategy::{SignalConfig, WaveTrendStrategy};
use wavebot::Gateway;

#[derive(Parser, Debug)]
#[command(name = "wavebot", about = "WaveTrend perpetual-futures trading bot")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wavebot=info,wavebot::strategy=debug".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let settings = Settings::load(&args.config)?;
    tracing::info!(
        "Starting wavebot: {:?} on {:?}, leverage {}x, size {} USDT",
        settings.symbols,
        settings.timeframes,
        settings.strategy.leverage,
        settings.strategy.fixed_size_usd
    );

    let gateway = Arc::new(BinanceFuturesGateway::from_env(settings.sandbox)?);
    let balance = gateway.fetch_balance().await;
    tracing::info!("Account balance: {:.2} USDT", balance);

    let strategy_config = SignalConfig {
        ob_level: settings.strategy.ob_level,
        os_level: settings.strategy.os_level,
        deep_os_level: settings.strategy.os_level3,
        div_ob_level: settings.strategy.wt_div_ob,
        div_os_level: settings.strategy.wt_div_os,
        ..SignalConfig::default()
    };
    let strategy = Arc::new(WaveTrendStrategy::new(strategy_config));
    let clock = Arc::new(SystemClock);
    let mut controller =
        LifecycleController::new(gateway.clone(), clock, strategy, settings);

    // The gateway must be released exactly once, on both paths
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
        _ = controller.run() => {
            tracing::error!("Polling loop terminated unexpectedly");
        }
    }
    gateway.close().await;
    Ok(())
}
