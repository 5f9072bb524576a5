use crate::bridge::{MqttTransport, TriggerBridge};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::frame_store::FrameStore;
use crate::inference::HttpInferenceClient;
use crate::server::{HttpServer, SharedState};
use crate::telemetry::Metrics;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            tracing::error!("Failed to initialize metrics: {:?}", e);
            return Err(e.into());
        }
    };

    let inference_client = match HttpInferenceClient::new(&config.inference) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to initialize inference client: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let frame_store = Arc::new(FrameStore::new());
    let dispatcher = Arc::new(
        Dispatcher::new(frame_store.clone(), inference_client)
            .with_max_frame_age(config.freshness.get_max_frame_age())
            .with_request_timeout(config.inference.get_timeout())
            .with_metrics(metrics.clone()),
    );

    let state = SharedState {
        frame_store,
        dispatcher: dispatcher.clone(),
        metrics,
    };
    let server = HttpServer::new(state, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let bridge_handle = if config.mqtt.enabled {
        let transport = MqttTransport::new(&config.mqtt);
        let bridge = TriggerBridge::new(transport, dispatcher, &config.mqtt);
        Some(tokio::spawn(bridge.run(shutdown_tx.subscribe())))
    } else {
        tracing::info!("Message bus trigger disabled");
        None
    };

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;
    if let Some(handle) = bridge_handle {
        let _ = handle.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
