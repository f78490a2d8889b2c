//! Approval coordinator - in-flight human approvals.
//!
//! A request is **pending** from [`ApprovalCoordinator::request_approval`]
//! until exactly one of: a response arrives ([`ApprovalCoordinator::respond`]),
//! the timeout fires, or it is cancelled. Whoever removes the entry from the
//! pending map resolves it; everyone else loses the race and does nothing.
//!
//! The coordinator only returns a resolution. Turning it into a grant and an
//! audit entry is the evaluator's job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{ApprovalError, ApprovalResult};
use crate::events::{ApprovalChannel, ApprovalEvent};
use crate::policy::TimeoutDecision;
use crate::request::{ApprovalRequest, ApprovalResolution, ApprovalResponse, RequestId};

struct Pending {
    request: ApprovalRequest,
    responder: oneshot::Sender<ApprovalResolution>,
}

/// Removes a pending entry if the awaiting future is dropped early.
struct PendingGuard<'a> {
    coordinator: &'a ApprovalCoordinator,
    id: &'a RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.coordinator.take(self.id).is_some() {
            debug!(id = %self.id, "approval waiter dropped, request withdrawn");
            self.coordinator.announce(self.id, &ApprovalResolution::Cancelled);
        }
    }
}

/// Tracks pending approval requests.
pub struct ApprovalCoordinator {
    pending: Mutex<HashMap<RequestId, Pending>>,
    channel: Arc<dyn ApprovalChannel>,
}

impl ApprovalCoordinator {
    /// Coordinator delivering requests through `channel`.
    #[must_use]
    pub fn new(channel: Arc<dyn ApprovalChannel>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            channel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Pending>> {
        self.pending.lock().unwrap_or_else(|e| {
            warn!("ApprovalCoordinator lock poisoned, recovering");
            e.into_inner()
        })
    }

    fn take(&self, id: &RequestId) -> Option<Pending> {
        self.lock().remove(id)
    }

    fn announce(&self, id: &RequestId, outcome: &ApprovalResolution) {
        self.channel.deliver(ApprovalEvent::Resolved {
            id: id.clone(),
            outcome: outcome.clone(),
        });
    }

    /// Publish `request` and wait for its resolution.
    ///
    /// Resolves to [`ApprovalResolution::TimedOut`] carrying
    /// `timeout_decision` when nobody answers within the request's timeout,
    /// or immediately when the channel cannot deliver the request.
    pub async fn request_approval(
        &self,
        request: ApprovalRequest,
        timeout_decision: TimeoutDecision,
    ) -> ApprovalResolution {
        let id = request.id.clone();
        let timeout = request.timeout();
        let (tx, mut rx) = oneshot::channel();

        self.lock().insert(
            id.clone(),
            Pending {
                request: request.clone(),
                responder: tx,
            },
        );
        let _guard = PendingGuard {
            coordinator: self,
            id: &id,
        };

        info!(
            id = %id,
            scope = %request.scope,
            action = %request.action,
            tool = %request.tool_name,
            risk = %request.risk,
            timeout_ms = request.timeout_ms,
            "approval requested"
        );

        if !self.channel.deliver(ApprovalEvent::Requested(request)) {
            warn!(id = %id, "approval channel unavailable, treating as timeout");
            self.take(&id);
            return ApprovalResolution::TimedOut {
                decision: timeout_decision,
            };
        }

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(_)) => ApprovalResolution::Cancelled,
            Err(_) => {
                if self.take(&id).is_some() {
                    let outcome = ApprovalResolution::TimedOut {
                        decision: timeout_decision,
                    };
                    warn!(id = %id, decision = %timeout_decision, "approval timed out");
                    self.announce(&id, &outcome);
                    outcome
                } else {
                    // A responder won the race; its answer is already in flight.
                    rx.await.unwrap_or(ApprovalResolution::Cancelled)
                }
            },
        }
    }

    /// Answer a pending request.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownRequest`] if `id` is not pending
    /// (already resolved, timed out, cancelled, or never issued).
    pub fn respond(
        &self,
        id: &RequestId,
        response: ApprovalResponse,
    ) -> ApprovalResult<ApprovalResolution> {
        let pending = self.take(id).ok_or_else(|| ApprovalError::UnknownRequest {
            id: id.to_string(),
        })?;
        let resolution = ApprovalResolution::from(response);
        info!(id = %id, tool = %pending.request.tool_name, outcome = %resolution, "approval answered");
        self.announce(id, &resolution);
        if pending.responder.send(resolution.clone()).is_err() {
            warn!(id = %id, "approval requester went away before the answer arrived");
        }
        Ok(resolution)
    }

    /// Cancel a pending request. The waiter sees [`ApprovalResolution::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownRequest`] if `id` is not pending.
    pub fn cancel(&self, id: &RequestId) -> ApprovalResult<()> {
        let pending = self.take(id).ok_or_else(|| ApprovalError::UnknownRequest {
            id: id.to_string(),
        })?;
        info!(id = %id, tool = %pending.request.tool_name, "approval cancelled");
        self.announce(id, &ApprovalResolution::Cancelled);
        let _ = pending.responder.send(ApprovalResolution::Cancelled);
        Ok(())
    }

    /// Cancel every pending request. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(RequestId, Pending)> = self.lock().drain().collect();
        let count = drained.len();
        for (id, pending) in drained {
            self.announce(&id, &ApprovalResolution::Cancelled);
            let _ = pending.responder.send(ApprovalResolution::Cancelled);
        }
        if count > 0 {
            info!(count, "cancelled all pending approvals");
        }
        count
    }

    /// Pending requests, oldest first.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<ApprovalRequest> {
        let mut requests: Vec<_> = self.lock().values().map(|p| p.request.clone()).collect();
        requests.sort_by_key(|r| r.timestamp);
        requests
    }

    /// Number of pending requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

impl std::fmt::Debug for ApprovalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalCoordinator")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ApprovalEventBus;
    use crate::grant::GrantDuration;
    use std::time::Duration;
    use warden_core::{Action, RiskLevel, Scope};

    fn request(timeout: Duration) -> ApprovalRequest {
        ApprovalRequest::new(Scope::Terminal, Action::Execute, "terminal_execute", RiskLevel::High, "run make")
            .with_resource_opt(Some("make"))
            .with_timeout(timeout)
    }

    fn setup() -> (Arc<ApprovalCoordinator>, ApprovalEventBus) {
        let bus = ApprovalEventBus::new();
        let coordinator = Arc::new(ApprovalCoordinator::new(Arc::new(bus.clone())));
        (coordinator, bus)
    }

    async fn next_request_id(rx: &mut crate::events::ApprovalEventReceiver) -> RequestId {
        loop {
            let event = rx.recv().await.unwrap();
            if let ApprovalEvent::Requested(req) = &*event {
                return req.id.clone();
            }
        }
    }

    #[tokio::test]
    async fn test_respond_resolves_waiter() {
        let (coordinator, bus) = setup();
        let mut rx = bus.subscribe();

        let c = Arc::clone(&coordinator);
        let waiter = tokio::spawn(async move {
            c.request_approval(request(Duration::from_secs(30)), TimeoutDecision::Deny)
                .await
        });

        let id = next_request_id(&mut rx).await;
        assert_eq!(coordinator.pending_count(), 1);
        let resolution = coordinator
            .respond(&id, ApprovalResponse::approve(GrantDuration::Session).with_notes("ok"))
            .unwrap();
        assert!(resolution.is_allowed());

        let got = waiter.await.unwrap();
        assert_eq!(got, resolution);
        assert_eq!(coordinator.pending_count(), 0);

        // terminal: a second answer is rejected
        let err = coordinator
            .respond(&id, ApprovalResponse::deny(GrantDuration::Once))
            .unwrap_err();
        assert!(matches!(err, ApprovalError::UnknownRequest { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_to_policy_decision() {
        let (coordinator, bus) = setup();
        let mut rx = bus.subscribe();

        let resolution = coordinator
            .request_approval(request(Duration::from_millis(500)), TimeoutDecision::Allow)
            .await;
        assert_eq!(resolution, ApprovalResolution::TimedOut {
            decision: TimeoutDecision::Allow
        });
        assert_eq!(coordinator.pending_count(), 0);

        assert_eq!(rx.recv().await.unwrap().event_type(), "approval_requested");
        let resolved = rx.recv().await.unwrap();
        assert!(matches!(
            &*resolved,
            ApprovalEvent::Resolved {
                outcome: ApprovalResolution::TimedOut { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_no_channel_is_immediate_timeout() {
        let (coordinator, _bus) = setup();
        let resolution = coordinator
            .request_approval(request(Duration::from_secs(3600)), TimeoutDecision::Deny)
            .await;
        assert_eq!(resolution, ApprovalResolution::TimedOut {
            decision: TimeoutDecision::Deny
        });
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel() {
        let (coordinator, bus) = setup();
        let mut rx = bus.subscribe();

        let c = Arc::clone(&coordinator);
        let waiter = tokio::spawn(async move {
            c.request_approval(request(Duration::from_secs(30)), TimeoutDecision::Allow)
                .await
        });
        let id = next_request_id(&mut rx).await;
        coordinator.cancel(&id).unwrap();
        assert_eq!(waiter.await.unwrap(), ApprovalResolution::Cancelled);
        assert!(coordinator.cancel(&id).is_err());
    }

    #[tokio::test]
    async fn test_concurrent_requests_and_cancel_all() {
        let (coordinator, bus) = setup();
        let mut rx = bus.subscribe();

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let c = Arc::clone(&coordinator);
            waiters.push(tokio::spawn(async move {
                c.request_approval(request(Duration::from_secs(30)), TimeoutDecision::Deny)
                    .await
            }));
        }
        let first = next_request_id(&mut rx).await;
        next_request_id(&mut rx).await;
        next_request_id(&mut rx).await;
        assert_eq!(coordinator.pending_requests().len(), 3);

        coordinator
            .respond(&first, ApprovalResponse::deny(GrantDuration::Once))
            .unwrap();
        assert_eq!(coordinator.cancel_all(), 2);

        let mut cancelled = 0u32;
        let mut denied = 0u32;
        for w in waiters {
            match w.await.unwrap() {
                ApprovalResolution::Cancelled => cancelled = cancelled.saturating_add(1),
                ApprovalResolution::Denied { .. } => denied = denied.saturating_add(1),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!((cancelled, denied), (2, 1));
    }

    #[tokio::test]
    async fn test_dropped_waiter_withdraws_request() {
        let (coordinator, bus) = setup();
        let mut rx = bus.subscribe();

        let c = Arc::clone(&coordinator);
        let waiter = tokio::spawn(async move {
            c.request_approval(request(Duration::from_secs(30)), TimeoutDecision::Deny)
                .await
        });
        let id = next_request_id(&mut rx).await;
        waiter.abort();
        let _ = waiter.await;
        assert_eq!(coordinator.pending_count(), 0);
        assert!(coordinator.respond(&id, ApprovalResponse::approve(GrantDuration::Once)).is_err());

        // frontends are told to retire the prompt
        let event = rx.try_recv().unwrap();
        assert_eq!(
            *event,
            ApprovalEvent::Resolved {
                id,
                outcome: ApprovalResolution::Cancelled,
            }
        );
        assert!(rx.try_recv().is_none());
    }
}
