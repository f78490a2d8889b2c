//! Permission controller - the service object callers hold.
//!
//! [`PermissionController`] owns one of each component and wires them
//! together: catalog, validator, rate limiter, grant store (with its file),
//! coordinator, evaluator, and the approval event bus. It is constructed once
//! at process start with [`PermissionController::open`] and shared as an
//! `Arc`.
//!
//! Decisions are synchronous. The only suspension point is waiting on a
//! human in the `authorize_*` methods. Grant file writes are fire-and-forget:
//! a failed save is logged and never rolls back the in-memory state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_audit::{AuditOutcome, AuditSink, InMemoryAuditLog};
use warden_core::{Action, Scope, SessionId};

use crate::catalog::PermissionCatalog;
use crate::command::{CommandValidationResult, CommandValidator, PathValidation, ValidatorConfig};
use crate::coordinator::ApprovalCoordinator;
use crate::error::{ApprovalError, ApprovalResult};
use crate::evaluator::{PermissionCheckResult, PermissionQuery, PolicyEvaluator};
use crate::events::{ApprovalChannel, ApprovalEventBus, ApprovalEventReceiver};
use crate::gate::{AlwaysOpen, OperationGate};
use crate::grant::{Grant, GrantFile, GrantId, GrantRequest, GrantState, GrantStore, PersistedState};
use crate::policy::Policy;
use crate::rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
use crate::request::{ApprovalRequest, ApprovalResolution, ApprovalResponse, RequestId};

/// Default interval between expired-grant sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest sweep interval accepted; smaller settings are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Tool name recorded on command authorizations.
const COMMAND_TOOL: &str = "terminal_execute";

/// Everything [`PermissionController::open`] needs besides collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Policy in effect at start. Wins over the policy stored in the grant file.
    pub policy: Policy,
    /// Command validator tables.
    pub validator: ValidatorConfig,
    /// Rate limiter settings.
    pub rate_limit: RateLimitConfig,
    /// Grant file. `None` keeps everything in memory.
    pub grants_path: Option<PathBuf>,
    /// Whether to load and save the grant file.
    pub persist: bool,
    /// Interval for [`PermissionController::spawn_sweeper`].
    pub sweep_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            validator: ValidatorConfig::default(),
            rate_limit: RateLimitConfig::default(),
            grants_path: None,
            persist: true,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Builder for [`PermissionController`].
pub struct PermissionControllerBuilder {
    settings: ControllerSettings,
    audit: Option<Arc<dyn AuditSink>>,
    gate: Option<Arc<dyn OperationGate>>,
    catalog: Option<Arc<PermissionCatalog>>,
    bus: Option<ApprovalEventBus>,
}

impl PermissionControllerBuilder {
    /// Builder over `settings` with default collaborators.
    #[must_use]
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            settings,
            audit: None,
            gate: None,
            catalog: None,
            bus: None,
        }
    }

    /// Audit sink. Defaults to an in-memory log.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Upstream gate. Defaults to [`AlwaysOpen`].
    #[must_use]
    pub fn gate(mut self, gate: Arc<dyn OperationGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Tool catalog. Defaults to the built-in table.
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<PermissionCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Share an existing event bus.
    #[must_use]
    pub fn event_bus(mut self, bus: ApprovalEventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Build the controller. See [`PermissionController::open`].
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRule`] if a validator table entry does
    /// not compile.
    pub fn build(self) -> ApprovalResult<Arc<PermissionController>> {
        PermissionController::assemble(self)
    }
}

/// A command that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandAuthorization {
    /// Validator verdict.
    pub validation: CommandValidationResult,
    /// Rate limiter verdict.
    pub rate_limit: RateLimitDecision,
    /// Permission decision.
    pub decision: PermissionCheckResult,
}

/// The permission engine as one service.
pub struct PermissionController {
    policy: Arc<RwLock<Policy>>,
    grants: Arc<GrantStore>,
    catalog: Arc<PermissionCatalog>,
    evaluator: PolicyEvaluator,
    coordinator: ApprovalCoordinator,
    validator: CommandValidator,
    rate_limiter: RateLimiter,
    bus: ApprovalEventBus,
    file: Option<Arc<GrantFile>>,
    sweep_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl PermissionController {
    /// Open a controller with default collaborators.
    ///
    /// Loads the grant file if `settings.persist` is set. A missing or
    /// unreadable file is logged and the controller starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRule`] if a validator table entry does
    /// not compile.
    pub fn open(settings: ControllerSettings) -> ApprovalResult<Arc<Self>> {
        PermissionControllerBuilder::new(settings).build()
    }

    /// Builder for custom collaborators.
    #[must_use]
    pub fn builder(settings: ControllerSettings) -> PermissionControllerBuilder {
        PermissionControllerBuilder::new(settings)
    }

    fn assemble(builder: PermissionControllerBuilder) -> ApprovalResult<Arc<Self>> {
        let PermissionControllerBuilder {
            settings,
            audit,
            gate,
            catalog,
            bus,
        } = builder;

        let validator = CommandValidator::new(settings.validator)?;
        let policy = settings.policy;
        let grants = Arc::new(GrantStore::with_limits(
            policy.enable_contextual_permissions,
            policy.max_cached_permissions,
        ));

        let file = settings
            .grants_path
            .filter(|_| settings.persist)
            .map(|path| Arc::new(GrantFile::new(path)));
        if let Some(file) = &file {
            match file.load() {
                Ok(Some(state)) => {
                    let restored = grants.restore(state.permissions);
                    if state.policy != policy {
                        debug!("stored policy differs from configured policy, using configured");
                    }
                    info!(path = %file.path().display(), restored, "grant file loaded");
                },
                Ok(None) => debug!(path = %file.path().display(), "no grant file yet"),
                Err(e) => warn!(path = %file.path().display(), error = %e, "failed to load grant file, starting empty"),
            }
        }

        let policy = Arc::new(RwLock::new(policy));
        let catalog = catalog.unwrap_or_else(|| Arc::new(PermissionCatalog::with_defaults()));
        let audit = audit.unwrap_or_else(|| Arc::new(InMemoryAuditLog::new()) as Arc<dyn AuditSink>);
        let gate = gate.unwrap_or_else(|| Arc::new(AlwaysOpen) as Arc<dyn OperationGate>);
        let bus = bus.unwrap_or_default();

        let evaluator = PolicyEvaluator::new(
            Arc::clone(&policy),
            Arc::clone(&grants),
            Arc::clone(&catalog),
            gate,
            audit,
        );
        let coordinator = ApprovalCoordinator::new(Arc::new(bus.clone()) as Arc<dyn ApprovalChannel>);

        let sweep_interval = if settings.sweep_interval < MIN_SWEEP_INTERVAL {
            warn!(
                requested_ms = settings.sweep_interval.as_millis(),
                "sweep interval too short, using minimum"
            );
            MIN_SWEEP_INTERVAL
        } else {
            settings.sweep_interval
        };

        Ok(Arc::new(Self {
            policy,
            grants,
            catalog,
            evaluator,
            coordinator,
            validator,
            rate_limiter: RateLimiter::new(settings.rate_limit),
            bus,
            file,
            sweep_interval,
            sweeper: Mutex::new(None),
        }))
    }

    // ---- Decisions ----------------------------------------------------

    /// Decide a tool call without waiting on a human.
    #[must_use]
    pub fn check_tool_permission(
        &self,
        tool_name: &str,
        resource: Option<&str>,
        context: Option<&str>,
    ) -> PermissionCheckResult {
        let result = self.evaluator.check_tool(tool_name, resource, context);
        self.save_if_durable(&result);
        result
    }

    /// Decide a scope + action query without waiting on a human.
    #[must_use]
    pub fn check_permission(&self, query: &PermissionQuery) -> PermissionCheckResult {
        let result = self.evaluator.check(query);
        self.save_if_durable(&result);
        result
    }

    /// Decide a tool call, asking a human if policy requires it.
    pub async fn authorize_tool(
        &self,
        tool_name: &str,
        resource: Option<&str>,
        context: Option<&str>,
    ) -> PermissionCheckResult {
        let query = self.evaluator.query_for_tool(tool_name, resource, context);
        self.authorize(&query).await.0
    }

    /// Decide a query, asking a human if policy requires it.
    pub async fn authorize_permission(&self, query: &PermissionQuery) -> PermissionCheckResult {
        self.authorize(query).await.0
    }

    async fn authorize(
        &self,
        query: &PermissionQuery,
    ) -> (PermissionCheckResult, Option<ApprovalResolution>) {
        let result = self.check_permission(query);
        if !result.requires_approval {
            return (result, None);
        }

        let policy = self.policy();
        let request = query.to_approval_request(&policy);
        let resolution = self
            .coordinator
            .request_approval(request, policy.timeout_decision)
            .await;
        let result = self.evaluator.apply_resolution(query, &resolution);
        self.save_if_durable(&result);
        (result, Some(resolution))
    }

    /// Authorize a shell command for a session.
    ///
    /// Runs the validator, the working-directory check, the rate limiter,
    /// and finally the evaluator under `terminal`/`execute` with the command
    /// as resource and the validator's risk. A validator warning forces an
    /// approval prompt.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::Blocked`] for a blocked command or working directory
    /// - [`ApprovalError::RateLimited`] when the session is over its limits
    /// - [`ApprovalError::Timeout`] when nobody answered and the timeout denies
    /// - [`ApprovalError::Denied`] for any other refusal
    pub async fn authorize_command(
        &self,
        session: &SessionId,
        command: &str,
        cwd: Option<&Path>,
        context: Option<&str>,
    ) -> ApprovalResult<CommandAuthorization> {
        let validation = self.validator.validate(command);
        let query = PermissionQuery::new(Scope::Terminal, Action::Execute)
            .with_resource_opt(Some(command))
            .with_tool_opt(Some(COMMAND_TOOL))
            .with_context_opt(context)
            .with_risk(validation.risk_level)
            .with_description(format!("run `{command}`"))
            .force_prompt(validation.requires_confirmation);

        if validation.is_blocked() {
            warn!(session = %session, reason = %validation.reason, "command blocked");
            self.evaluator
                .audit_query(&query, AuditOutcome::Denied, &validation.reason, None);
            return Err(ApprovalError::Blocked {
                target: command.to_string(),
                reason: validation.reason,
            });
        }

        if let Some(cwd) = cwd {
            let check = self.validator.validate_working_directory(cwd);
            if !check.allowed {
                warn!(session = %session, cwd = %cwd.display(), reason = %check.reason, "working directory blocked");
                self.evaluator
                    .audit_query(&query, AuditOutcome::Denied, &check.reason, None);
                return Err(ApprovalError::Blocked {
                    target: cwd.display().to_string(),
                    reason: check.reason,
                });
            }
        }

        let rate_limit = self.rate_limiter.check(session);
        if !rate_limit.allowed {
            warn!(session = %session, retry_after_ms = rate_limit.reset_in_ms, "rate limited");
            self.evaluator
                .audit_query(&query, AuditOutcome::Denied, "rate limited", None);
            return Err(ApprovalError::RateLimited {
                retry_after_ms: rate_limit.reset_in_ms,
            });
        }

        let (decision, resolution) = self.authorize(&query).await;
        if decision.allowed {
            return Ok(CommandAuthorization {
                validation,
                rate_limit,
                decision,
            });
        }
        match resolution {
            Some(ApprovalResolution::TimedOut { .. }) => Err(ApprovalError::Timeout {
                timeout_ms: self.policy().approval_timeout_ms,
            }),
            _ => Err(ApprovalError::Denied {
                reason: decision.reason,
            }),
        }
    }

    // ---- Command safety -----------------------------------------------

    /// Validate a command string.
    #[must_use]
    pub fn validate_command(&self, command: &str) -> CommandValidationResult {
        self.validator.validate(command)
    }

    /// Validate a filesystem path.
    #[must_use]
    pub fn validate_path(&self, path: &Path) -> PathValidation {
        self.validator.validate_path(path)
    }

    /// Validate a working directory.
    #[must_use]
    pub fn validate_working_directory(&self, cwd: &Path) -> PathValidation {
        self.validator.validate_working_directory(cwd)
    }

    // ---- Grants -------------------------------------------------------

    /// Record an allow decision.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRule`] if the resource pattern does
    /// not compile.
    pub fn grant_permission(&self, mut request: GrantRequest) -> ApprovalResult<Grant> {
        request.state = GrantState::Granted;
        self.record(request)
    }

    /// Record a remembered refusal.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRule`] if the resource pattern does
    /// not compile.
    pub fn deny_permission(&self, mut request: GrantRequest) -> ApprovalResult<Grant> {
        request.state = GrantState::Denied;
        self.record(request)
    }

    fn record(&self, request: GrantRequest) -> ApprovalResult<Grant> {
        let grant = self.evaluator.record(request)?;
        if grant.duration.is_persistent() {
            self.schedule_save();
        }
        Ok(grant)
    }

    /// Revoke one grant.
    pub fn revoke(&self, id: &GrantId) -> Option<Grant> {
        let grant = self.grants.revoke(id)?;
        info!(grant = %grant.id, scope = %grant.scope, "grant revoked");
        self.after_revoke(std::slice::from_ref(&grant), "revoked");
        Some(grant)
    }

    /// Revoke every grant for `scope`.
    pub fn revoke_by_scope(&self, scope: Scope) -> Vec<Grant> {
        let removed = self.grants.revoke_by_scope(scope);
        info!(scope = %scope, count = removed.len(), "scope revoked");
        self.after_revoke(&removed, &format!("revoked scope {scope}"));
        removed
    }

    /// Revoke every grant recorded for `tool_name`.
    pub fn revoke_by_tool(&self, tool_name: &str) -> Vec<Grant> {
        let removed = self.grants.revoke_by_tool(tool_name);
        info!(tool = tool_name, count = removed.len(), "tool revoked");
        self.after_revoke(&removed, &format!("revoked tool {tool_name}"));
        removed
    }

    /// Drop session and once grants.
    pub fn clear_session(&self) -> Vec<Grant> {
        let removed = self.grants.clear_session();
        info!(count = removed.len(), "session grants cleared");
        self.after_revoke(&removed, "session cleared");
        removed
    }

    /// Drop every grant.
    pub fn clear_all(&self) -> Vec<Grant> {
        let removed = self.grants.clear_all();
        info!(count = removed.len(), "all grants cleared");
        self.after_revoke(&removed, "all grants cleared");
        removed
    }

    fn after_revoke(&self, removed: &[Grant], reason: &str) {
        self.evaluator.audit_revoked(removed, reason);
        if removed.iter().any(|g| g.duration.is_persistent()) {
            self.schedule_save();
        }
    }

    // ---- Approvals ----------------------------------------------------

    /// Answer a pending approval.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownRequest`] if `id` is not pending.
    pub fn respond_to_approval(
        &self,
        id: &RequestId,
        response: ApprovalResponse,
    ) -> ApprovalResult<ApprovalResolution> {
        self.coordinator.respond(id, response)
    }

    /// Cancel a pending approval. The waiter is denied and nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownRequest`] if `id` is not pending.
    pub fn cancel_request(&self, id: &RequestId) -> ApprovalResult<()> {
        self.coordinator.cancel(id)
    }

    /// In-flight approvals, oldest first.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<ApprovalRequest> {
        self.coordinator.pending_requests()
    }

    /// Subscribe to approval events.
    #[must_use]
    pub fn subscribe(&self) -> ApprovalEventReceiver {
        self.bus.subscribe()
    }

    // ---- Policy -------------------------------------------------------

    /// Snapshot of the policy in effect.
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.evaluator.policy()
    }

    /// Replace the policy. Cache limits apply immediately.
    pub fn update_policy(&self, policy: Policy) {
        self.grants
            .set_limits(policy.enable_contextual_permissions, policy.max_cached_permissions);
        {
            let mut current = self.policy.write().unwrap_or_else(|e| {
                warn!("Policy lock poisoned, recovering");
                e.into_inner()
            });
            *current = policy;
        }
        info!("policy updated");
        self.schedule_save();
    }

    // ---- Accessors ----------------------------------------------------

    /// Tool catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<PermissionCatalog> {
        &self.catalog
    }

    /// Grant store.
    #[must_use]
    pub fn grants(&self) -> &Arc<GrantStore> {
        &self.grants
    }

    /// Command validator.
    #[must_use]
    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    /// Rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Evaluator.
    #[must_use]
    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    /// Grant file path, if persistence is on.
    #[must_use]
    pub fn grants_path(&self) -> Option<&Path> {
        self.file.as_deref().map(GrantFile::path)
    }

    // ---- Lifecycle ----------------------------------------------------

    /// Evict expired grants and idle rate-limit sessions. Returns the number
    /// of grants evicted.
    pub fn sweep_expired(&self) -> usize {
        let expired = self.grants.sweep_expired();
        self.evaluator.audit_expired(&expired);
        let idle = self.rate_limiter.prune_idle();
        if !expired.is_empty() || idle > 0 {
            debug!(expired = expired.len(), idle_sessions = idle, "sweep finished");
        }
        if expired.iter().any(|g| g.duration.is_persistent()) {
            self.schedule_save();
        }
        expired.len()
    }

    /// Start the periodic sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference and ends once the controller is
    /// dropped. Returns `false` if no runtime is available.
    pub fn spawn_sweeper(self: &Arc<Self>) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!("no tokio runtime, expired grants are only evicted on lookup");
            return false;
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.sweep_interval;
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.sweep_expired();
            }
        });

        let mut slot = self.sweeper.lock().unwrap_or_else(|e| {
            warn!("sweeper lock poisoned, recovering");
            e.into_inner()
        });
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
        debug!(interval_secs = period.as_secs(), "grant sweeper started");
        true
    }

    /// Stop the sweeper, cancel pending approvals, and write the grant file.
    ///
    /// # Errors
    ///
    /// Returns the error from the final save.
    pub fn shutdown(&self) -> ApprovalResult<()> {
        if let Some(task) = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| {
                warn!("sweeper lock poisoned, recovering");
                e.into_inner()
            })
            .take()
        {
            task.abort();
        }
        let cancelled = self.coordinator.cancel_all();
        info!(cancelled, "permission controller shutting down");

        match &self.file {
            Some(file) => {
                let seq = file.next_sequence();
                file.save(seq, &self.persisted_state()).map(|_| ())
            },
            None => Ok(()),
        }
    }

    // ---- Persistence --------------------------------------------------

    fn persisted_state(&self) -> PersistedState {
        PersistedState {
            permissions: self.grants.snapshot(),
            policy: self.policy(),
        }
    }

    fn save_if_durable(&self, result: &PermissionCheckResult) {
        if result
            .permission
            .as_ref()
            .is_some_and(|g| g.duration.is_persistent())
        {
            self.schedule_save();
        }
    }

    /// Write the grant file without blocking the caller.
    ///
    /// The snapshot is taken now; the write runs on the blocking pool when a
    /// runtime is available and inline otherwise.
    fn schedule_save(&self) {
        let Some(file) = &self.file else {
            return;
        };
        let seq = file.next_sequence();
        let state = self.persisted_state();
        let file = Arc::clone(file);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || write_grant_file(&file, seq, &state));
            },
            Err(_) => write_grant_file(&file, seq, &state),
        }
    }
}

fn write_grant_file(file: &GrantFile, seq: u64, state: &PersistedState) {
    match file.save(seq, state) {
        Ok(true) => debug!(path = %file.path().display(), seq, "grant file saved"),
        Ok(false) => debug!(path = %file.path().display(), seq, "stale grant file save skipped"),
        Err(e) => warn!(path = %file.path().display(), error = %e, "failed to save grant file"),
    }
}

impl std::fmt::Debug for PermissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionController")
            .field("grants", &self.grants.count())
            .field("tools", &self.catalog.len())
            .field("pending", &self.coordinator.pending_count())
            .field("grants_path", &self.grants_path())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
