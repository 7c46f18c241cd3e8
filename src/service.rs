use async_trait::async_trait;

use crate::error::ApiResult;

/// Setup / main-loop / teardown contract for long-running daemon tasks.
#[async_trait]
pub trait Service {
    async fn start(&mut self) -> ApiResult<()>;
    async fn run(&mut self) -> ApiResult<()>;
    async fn stop(&mut self) -> ApiResult<()>;
}

/// Drive a service through its lifecycle. `stop` runs even when the main
/// loop fails, so session handles are always released.
pub async fn run_service<S: Service + Send>(mut svc: S) -> ApiResult<()> {
    svc.start().await?;
    let result = svc.run().await;
    svc.stop().await?;
    result
}
