//! Shared harness for integration tests.

use std::sync::Arc;

use warden_approval::{
    ApprovalEvent, ApprovalResponse, ControllerSettings, PermissionController,
};
use warden_audit::{AuditSink, InMemoryAuditLog};

/// A controller wired to an in-memory audit log.
#[allow(dead_code)]
pub struct Harness {
    /// The controller under test.
    pub controller: Arc<PermissionController>,
    /// Every decision the controller audited.
    pub audit: Arc<InMemoryAuditLog>,
}

#[allow(dead_code)]
impl Harness {
    /// Build a harness from settings.
    pub fn new(settings: ControllerSettings) -> Self {
        let audit = Arc::new(InMemoryAuditLog::new());
        let controller = PermissionController::builder(settings)
            .audit(Arc::clone(&audit) as Arc<dyn AuditSink>)
            .build()
            .expect("controller should build");
        Self { controller, audit }
    }

    /// Default settings without a grant file.
    pub fn in_memory() -> Self {
        Self::new(in_memory_settings())
    }

    /// Answer every approval request with `response` until dropped.
    pub fn auto_respond(&self, response: ApprovalResponse) -> tokio::task::JoinHandle<()> {
        let mut events = self.controller.subscribe();
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let ApprovalEvent::Requested(request) = event.as_ref() {
                    let _ = controller.respond_to_approval(&request.id, response.clone());
                }
            }
        })
    }
}

/// Default settings with persistence off.
#[allow(dead_code)]
pub fn in_memory_settings() -> ControllerSettings {
    ControllerSettings {
        persist: false,
        ..ControllerSettings::default()
    }
}
