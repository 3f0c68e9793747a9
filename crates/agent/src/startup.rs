use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use adapters::classifier::StandardClassifierFactory;
use adapters::netsim::{SimConntrack, SimNetwork};
use adapters::offload::ChannelOffloadTransport;
use adapters::storage::{
    InMemoryConnectionStore, InMemoryIdentityStore, InMemoryInterfaceStore,
};
use application::accel_engine::AccelEngine;
use application::classify::ClassifierRuntime;
use application::control_service_impl::ControlState;
use application::dispatch::PacketDispatcher;
use application::establish::IdentityEstablisher;
use application::hierarchy::HierarchyResolver;
use application::sync_pipeline::OffloadEventDispatcher;
use domain::accel::counters::AcceleratedCounts;
use infrastructure::config::ManagerConfig;
use infrastructure::logging::init_logging;
use infrastructure::metrics::ManagerMetrics;
use ports::primary::control::ControlPort;

use crate::cli::Cli;
use crate::shutdown;

/// Run the manager until interrupted.
///
/// Without a hardware engine present the agent wires the channel
/// transport and the simulated network view (loopback mode); the
/// packet hook and offload transport adapters are swapped in by the
/// platform integration.
pub async fn run(cli: &Cli) -> Result<()> {
    let config = if cli.config.exists() {
        ManagerConfig::load(&cli.config)?
    } else {
        ManagerConfig::from_yaml("{}")?
    };

    init_logging(config.manager.log_level, config.manager.log_format)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "flowaccel agent starting"
    );

    let metrics = Arc::new(ManagerMetrics::new());
    let network = Arc::new(SimNetwork::new());
    let conntrack = Arc::new(SimConntrack::new());
    let interfaces = Arc::new(InMemoryInterfaceStore::new());
    let identities = Arc::new(InMemoryIdentityStore::new());
    let store = Arc::new(InMemoryConnectionStore::new());

    let (event_tx, event_rx) = mpsc::channel(config.manager.event_channel_capacity);
    let transport = Arc::new(ChannelOffloadTransport::new(event_tx));

    let counters = Arc::new(AcceleratedCounts::new());
    let control = Arc::new(ControlState::new(config.accel_limits(), Arc::clone(&counters)));

    let engine = Arc::new(AccelEngine::new(
        transport,
        conntrack.clone(),
        counters,
        metrics.clone(),
        config.rule_settings(),
    ));

    let resolver = Arc::new(HierarchyResolver::new(
        network.clone(),
        network.clone(),
        network.clone(),
        interfaces,
    ));
    let establisher = Arc::new(IdentityEstablisher::new(
        identities,
        network.clone(),
        network.clone(),
    ));
    let classifiers = Arc::new(ClassifierRuntime::new(
        Arc::new(StandardClassifierFactory::new(config.dscp_marking())),
        metrics.clone(),
    ));

    let _dispatcher = Arc::new(PacketDispatcher::new(
        store.clone(),
        resolver,
        establisher,
        classifiers,
        engine.clone(),
        conntrack.clone(),
        control.clone(),
        metrics.clone(),
    ));

    let events = OffloadEventDispatcher::new(
        store,
        engine,
        conntrack,
        network,
        metrics,
    );
    let cancel = CancellationToken::new();
    let event_task = tokio::spawn(events.run(event_rx, cancel.clone()));

    tracing::info!("flowaccel agent running");
    shutdown::wait_for_signal().await?;

    // New connections fail open while in-flight work settles.
    control.begin_terminate();
    cancel.cancel();
    event_task.await?;

    tracing::info!("flowaccel agent stopped");
    Ok(())
}
