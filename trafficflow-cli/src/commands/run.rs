//! `run` command: collector, consumer and WebSocket transport.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use trafficflow::cache::{TieredCache, DEFAULT_REDIS_TIMEOUT};
use trafficflow::clock::system_clock;
use trafficflow::config::{AppConfig, ConfigFile};
use trafficflow::events::{EventBus, EventPublisher, EventQueue, RedisEventBus};
use trafficflow::logging::init_logging;
use trafficflow::orchestrator::EventDrivenCollector;
use trafficflow::source::FixtureSource;
use trafficflow::transport::serve;

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// JSON fixture file supplying observations and incidents
    #[arg(long)]
    pub fixture: PathBuf,

    /// Override the transport listen address
    #[arg(long)]
    pub bind: Option<String>,

    /// Disable the remote cache tier
    #[arg(long)]
    pub memory_only: bool,

    /// Run one cycle, publish the results and exit
    #[arg(long)]
    pub once: bool,
}

pub fn run(config_path: &Path, args: RunArgs) -> Result<(), CliError> {
    let mut app = ConfigFile::load_or_default(config_path)?.to_app_config()?;
    if let Some(bind) = &args.bind {
        app.transport.bind_address = bind.clone();
    }
    if args.memory_only {
        app.cache = app.cache.memory_only();
    }
    if app.locations.is_empty() {
        return Err(CliError::Config(format!(
            "No watched locations. Add a [location.<name>] section to {}",
            config_path.display()
        )));
    }

    let _guard = init_logging(&app.logging)?;
    info!(
        config = %config_path.display(),
        fixture = %args.fixture.display(),
        locations = app.locations.len(),
        "TrafficFlow starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(serve_pipeline(app, args))
}

async fn serve_pipeline(app: AppConfig, args: RunArgs) -> Result<(), CliError> {
    let clock = system_clock();
    let cache = Arc::new(TieredCache::connect(&app.cache, clock.clone()).await);

    let bus: Option<Arc<dyn EventBus>> = match &app.bus_url {
        Some(url) => match RedisEventBus::connect(url, DEFAULT_REDIS_TIMEOUT).await {
            Ok(bus) => Some(Arc::new(bus)),
            Err(e) => {
                warn!(url = %url, error = %e, "Event bus unavailable, continuing without it");
                None
            }
        },
        None => None,
    };
    let publisher = Arc::new(EventPublisher::new(bus));

    let source = Arc::new(FixtureSource::new("fixture", &args.fixture));
    let collector = EventDrivenCollector::builder(app.collector.clone())
        .detection(app.detection.clone())
        .locations(app.locations.clone())
        .observation_source(source.clone())
        .incident_source(source)
        .queue(Arc::new(EventQueue::new(app.queue_capacity)))
        .publisher(Arc::clone(&publisher))
        .cache(cache)
        .clock(clock)
        .build();

    if args.once {
        let report = collector.run_cycle().await;
        while collector.process_batch().await > 0 {}
        println!(
            "{} events from {} locations ({} source failures)",
            report.events_enqueued(),
            report.locations.len(),
            report.sources_failed()
        );
        println!("{}", collector.stats());
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    ctrlc::set_handler(move || on_signal.cancel())?;

    let listener = TcpListener::bind(&app.transport.bind_address).await?;
    let server = tokio::spawn(serve(
        listener,
        Arc::clone(&publisher),
        app.transport.clone(),
        shutdown.clone(),
    ));

    let handle = collector.start(shutdown.clone())?;
    println!("TrafficFlow running on ws://{}. Press Ctrl-C to stop.", app.transport.bind_address);

    shutdown.cancelled().await;
    info!("Shutdown requested");
    handle.shutdown().await;

    match server.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "Transport task ended abnormally"),
    }

    println!("{}", collector.stats());
    Ok(())
}
