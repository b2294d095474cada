//! `serve`: run the simulated peripheral and its control plane until
//! interrupted.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use blesim_config::JsonFileLoader;
use blesim_core::{AdapterController, SimulatedRadio};

use crate::cli::{GlobalOpts, ServeArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: ServeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut settings = config::load_settings(global)?;
    if let Some(host) = args.host {
        settings.http.host = host;
    }
    if let Some(port) = args.port {
        settings.http.port = port;
    }
    if args.no_drift {
        settings.drift.enabled = false;
    }

    let controller_config = config::controller_config(&settings)?;
    info!(path = %controller_config.origin, "config loaded");

    let radio = SimulatedRadio::new();
    let controller = AdapterController::builder(controller_config, Arc::new(radio.clone()))
        .loader(Arc::new(JsonFileLoader))
        .build();
    controller.init().await?;
    controller.start().await;
    if settings.drift.enabled {
        controller
            .start_drift(settings.drift.to_drift_config())
            .await;
    }

    let addr = settings.http.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| CliError::Bind { addr, source })?;

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(blesim_api::serve(
        listener,
        controller.clone(),
        shutdown.clone(),
    ));

    if !args.powered_off {
        radio.power_on();
    }
    info!(device = %controller.device_name(), "simulator running");

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            shutdown.cancel();
            match server.await {
                Ok(Err(e)) => error!(error = %e, "control plane error during shutdown"),
                Err(e) => error!(error = %e, "control plane task failed"),
                Ok(Ok(())) => {}
            }
            signal.map_err(CliError::from)
        }
        joined = &mut server => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CliError::Io(e)),
            Err(e) => Err(CliError::Io(std::io::Error::other(e))),
        },
    };

    controller.shutdown().await;
    result
}
