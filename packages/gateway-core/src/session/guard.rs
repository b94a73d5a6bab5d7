use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::manager::SessionManager;

/// RAII guard returned by [`SessionManager::register`]. Unregisters the
/// session from the live-sessions map on drop, guaranteeing cleanup even if
/// the WS handler returns early or panics mid-connection.
pub struct SessionGuard {
    id: String,
    manager: Arc<SessionManager>,
    cancel_token: CancellationToken,
}

impl SessionGuard {
    pub(crate) fn new(id: String, manager: Arc<SessionManager>, cancel_token: CancellationToken) -> Self {
        Self {
            id,
            manager,
            cancel_token,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.manager.unregister(&self.id);
        tracing::debug!(session_id = %self.id, "session_closed");
        log::info!("[session] cleaned up: {}", self.id);
    }
}
