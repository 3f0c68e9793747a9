use anyhow::Result;

/// Block until the process receives an interrupt.
pub async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");
    Ok(())
}
