//! Daemon orchestration
//!
//! [`Daemon`] is the composition root: it builds the peripheral for the
//! configured role, runs the status endpoint next to the peripheral event
//! loop and owns the retry policy for rejected advertising commands.

use std::future::Future;

use iotsc_core::{ConnectionStatus, Peripheral, PlatformStack, Service};
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::device_id;
use crate::error::Result;
use crate::status::StatusServer;

pub struct Daemon<S> {
    config: DaemonConfig,
    peripheral: Peripheral<S>,
}

impl<S: PlatformStack> Daemon<S> {
    /// Build the peripheral and its single service from `config`
    pub fn new(config: DaemonConfig, stack: S) -> Result<Self> {
        let role = config.peripheral.role;
        let device_id = device_id::resolve(&config.peripheral.device_id);
        info!(
            "Preparing {} peripheral '{}' with device id '{}'",
            role, config.peripheral.alias, device_id
        );

        let mut peripheral = Peripheral::new(
            stack,
            config.peripheral.alias.clone(),
            config.peripheral.auto_advertise,
        );
        peripheral.add_service(Service::new(0, role, device_id))?;
        peripheral.add_advertised_service_uuid(role.service_uuid())?;

        let template = config.peripheral.device_id.clone();
        peripheral.set_on_remote_disconnected(move |service| device_id::refresh(&template, service));

        Ok(Self { config, peripheral })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn peripheral(&self) -> &Peripheral<S> {
        &self.peripheral
    }

    pub fn status(&self) -> ConnectionStatus {
        self.peripheral.status()
    }

    /// Bind the status endpoint to the configured loopback address
    pub async fn bind_status(&self) -> Result<StatusServer> {
        StatusServer::bind(&self.config.status, self.status()).await
    }

    /// Run until the peripheral fails or Ctrl-C is pressed
    pub async fn run(self) -> Result<()> {
        let server = self.bind_status().await?;
        self.serve(server, shutdown_signal()).await
    }

    /// Run the peripheral and `server` until the peripheral fails or
    /// `shutdown` completes, then stop advertising
    pub async fn serve<F>(mut self, server: StatusServer, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let status_task = tokio::spawn(async move {
            if let Err(e) = server.serve().await {
                error!("Status endpoint stopped: {}", e);
            }
        });

        let result = tokio::select! {
            result = self.run_peripheral() => result,
            _ = shutdown => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        status_task.abort();
        if let Err(e) = self.peripheral.shutdown().await {
            warn!("Failed to stop advertising during shutdown: {}", e);
        }
        result
    }

    async fn run_peripheral(&mut self) -> Result<()> {
        let max_retries = self.config.peripheral.advertising_retries;
        let delay = self.config.retry_delay();
        let mut retries = 0;

        loop {
            match self.peripheral.run().await {
                Err(e) if e.is_advertising() && retries < max_retries => {
                    retries += 1;
                    warn!(
                        "{}; re-entering peripheral loop in {:?} ({}/{})",
                        e, delay, retries, max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!("Peripheral stopped: {}", e);
                    return Err(e.into());
                }
                Ok(()) => return Ok(()),
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
