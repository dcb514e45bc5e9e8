use std::sync::Arc;
use std::time::Duration;

use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::chain::lcd::ChainClient;
use crate::chain::types::TxInfo;

/// Background lookup of a broadcast transaction, repeated every `interval`
/// until the chain reports a height. The task is aborted when the handle is
/// dropped.
pub struct PollHandle {
    txhash: String,
    handle: JoinHandle<TxInfo>,
}

impl PollHandle {
    pub fn spawn(client: Arc<dyn ChainClient>, txhash: String, interval: Duration) -> Self {
        let hash = txhash.clone();
        let handle = tokio::spawn(async move {
            let mut attempts: u64 = 0;
            loop {
                attempts += 1;
                match client.tx_info(&hash).await {
                    Ok(Some(info)) if info.is_included() => {
                        debug!(txhash = %hash, height = info.height, attempts, "transaction included");
                        return info;
                    }
                    Ok(_) => {}
                    // Connectivity problems are not a verdict on the transaction
                    Err(e) => warn!(txhash = %hash, error = %e, "transaction lookup failed"),
                }
                tokio::time::sleep(interval).await;
            }
        });

        Self { txhash, handle }
    }

    pub fn txhash(&self) -> &str {
        &self.txhash
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// The included transaction. A poll aborted before inclusion reports a
    /// `JoinError` with `is_cancelled()`; a lookup that panicked reports
    /// `is_panic()`.
    pub async fn wait(&mut self) -> Result<TxInfo, JoinError> {
        (&mut self.handle).await
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
