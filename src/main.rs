use smgw_reader::obis;
use smgw_reader::{AnyGateway, Gateway, GatewayConfig, Information};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("Starting smart meter gateway reader");
    let config = GatewayConfig::from_env()?;
    config.print_summary();

    let gateway = AnyGateway::connect(&config).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down");
                cancel.cancel();
            }
        });
    }

    if config.poll_interval.is_zero() {
        let info = gateway.get_readings(&cancel).await?;
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match gateway.get_readings(&cancel).await {
            Ok(info) => log_readings(&info),
            Err(smgw_reader::GatewayError::Cancelled) => break,
            Err(e) => tracing::error!("Failed to fetch readings: {e}"),
        }
    }

    Ok(())
}

fn log_readings(info: &Information) {
    tracing::info!(
        "{} ({} {}): {} readings",
        info.name,
        info.manufacturer,
        info.model,
        info.readings.len()
    );
    for (code, reading) in &info.readings {
        tracing::info!(
            "  {code} {} {}: {}",
            reading.value,
            reading.unit,
            obis::describe(code.as_str())
        );
    }
}
