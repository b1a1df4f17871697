use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::BlockNumber;
use chain::limits::RpcLimitations;
use tokio::sync::{Mutex, RwLock};

/// Process-wide state of one chain, created at startup and shared by every
/// import job running against it.
///
/// Only one pass may run per chain at a time; the recent import cursor is
/// read before planning and advanced only through the [`PassGuard`] once the
/// pass has completed.
#[derive(Debug)]
pub struct ChainState {
    chain: String,
    limitations: RwLock<RpcLimitations>,
    recent_import: Mutex<Option<BlockNumber>>,
    in_progress: AtomicBool,
}

impl ChainState {
    pub fn new(chain: impl Into<String>, limitations: RpcLimitations) -> Arc<Self> {
        Arc::new(Self {
            chain: chain.into(),
            limitations: RwLock::new(limitations),
            recent_import: Mutex::new(None),
            in_progress: AtomicBool::new(false),
        })
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub async fn limitations(&self) -> RpcLimitations {
        self.limitations.read().await.clone()
    }

    pub async fn set_limitations(&self, limitations: RpcLimitations) {
        *self.limitations.write().await = limitations;
    }

    /// Last block imported by a completed recent pass.
    pub async fn recent_import(&self) -> Option<BlockNumber> {
        *self.recent_import.lock().await
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// `None` when another pass already holds this chain.
    pub fn try_begin_pass(self: &Arc<Self>) -> Option<PassGuard> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard { state: Arc::clone(self) })
    }
}

/// Releases the chain's in-progress flag on drop.
#[derive(Debug)]
pub struct PassGuard {
    state: Arc<ChainState>,
}

impl PassGuard {
    /// Moves the recent import cursor forward; it never goes back.
    pub async fn complete(self, imported_up_to: BlockNumber) {
        let mut cursor = self.state.recent_import.lock().await;
        *cursor = Some(cursor.map_or(imported_up_to, |c| c.max(imported_up_to)));
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.state.in_progress.store(false, Ordering::Release);
    }
}
