use clap::Parser;
use fleetwatch::{
    acquire::MetricAcquirer,
    backend::BackendClient,
    config::read_config_file,
    orchestrator::OrchestratorHandle,
    sink::{InfluxSink, MetricsSink},
    targets::filter_targets,
};
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("fleetwatch", LevelFilter::TRACE),
        ("fleetwatch_agent", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let mut backend = BackendClient::new(&config.backend);
    backend.authenticate().await?;

    let records = backend.fetch_targets().await?;
    info!("backend lists {} equipment records", records.len());

    let targets = filter_targets(records);
    if targets.is_empty() {
        anyhow::bail!("no valid targets to monitor");
    }

    for target in &targets {
        info!("monitoring {} ({})", target.name, target.address);
    }

    let acquirer = MetricAcquirer::from_config(&config);

    let sink: Option<Box<dyn MetricsSink>> = match &config.influx {
        Some(influx) => match InfluxSink::new(influx) {
            Ok(sink) => Some(Box::new(sink)),
            Err(e) => {
                warn!("metrics sink disabled: {e}");
                None
            }
        },
        None => None,
    };

    info!(
        "polling {} targets every {}s (cooldown {}s)",
        targets.len(),
        config.interval,
        config.cooldown
    );

    let (handle, join) = OrchestratorHandle::spawn(&config, targets, backend, acquirer, sink);

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    handle.shutdown().await?;
    if let Err(e) = join.await {
        error!("orchestrator task failed: {e}");
    }

    Ok(())
}
