mod api;
mod client;
mod config;
mod credentials;
mod error;
mod model;
mod reconciler;

pub use api::*;
pub use client::*;
pub use config::*;
pub use credentials::*;
pub use error::*;
pub use model::*;
pub use reconciler::*;

/// Run a single reconciliation for the device described by `file`.
pub async fn run(file: DesiredStateFile) -> anyhow::Result<OperationResult> {
    let (connection, desired) = file.into_parts()?;
    log::debug!("Desired state: {desired:#?}");

    log::info!("Connecting to PRTG at {}", connection.url);
    let client = PrtgClientBuilder::from_url(connection.url, connection.credentials)
        .client(connection.client)
        .build()?;

    let result = DeviceReconciler::new(client).apply(&desired).await;
    log::info!(
        "Reconciled device '{}': changed={}, failed={}",
        desired.device_name,
        result.changed,
        result.failed
    );

    Ok(result)
}
