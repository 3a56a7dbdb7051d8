//! Validates, deduplicates, and schedules inbound webhook work.

use std::{sync::Arc, time::Duration};

use tracing::{debug, error, warn};

use {
    confab_common::{FlowEngine, InboundMessage},
    confab_live::LiveModeService,
    confab_locks::{Acquire, UserLockManager},
    confab_whatsapp::{
        payload::{WebhookPayload, extract_inbound},
        verify,
    },
};

use crate::{
    Error, Result,
    queue::{JobQueue, Submit},
};

/// Per-user serialization policy.
#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    /// Auto-release safety net if the holder crashes.
    pub lease: Duration,
    /// Bounded wait before a contended message is dropped.
    pub wait: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            wait: Duration::from_secs(5),
        }
    }
}

pub struct CoordinatorConfig {
    /// Shared secret keying the delivery signature.
    pub app_secret: String,
    /// Token expected during the subscription handshake.
    pub verify_token: String,
    /// Our Cloud API number; entries for other numbers are skipped.
    pub phone_number_id: String,
    pub lock: LockPolicy,
}

/// Front door for inbound webhooks.
pub struct WebhookCoordinator {
    config: CoordinatorConfig,
    queue: Arc<JobQueue>,
    locks: Arc<UserLockManager>,
    live: Arc<LiveModeService>,
    engine: Arc<dyn FlowEngine>,
}

impl WebhookCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        queue: Arc<JobQueue>,
        locks: Arc<UserLockManager>,
        live: Arc<LiveModeService>,
        engine: Arc<dyn FlowEngine>,
    ) -> Self {
        Self {
            config,
            queue,
            locks,
            live,
            engine,
        }
    }

    /// Subscription handshake (GET): the challenge to echo, or an auth
    /// error.
    pub fn verify_subscription(
        &self,
        mode: Option<&str>,
        token: Option<&str>,
        challenge: Option<&str>,
    ) -> Result<String> {
        verify::subscription_challenge(mode, token, challenge, &self.config.verify_token)
            .ok_or(Error::Auth("webhook challenge mismatch"))
    }

    /// Delivery (POST): authenticate the raw body, parse it, and schedule
    /// one idempotent job per message. Returns how many jobs were newly
    /// scheduled so the HTTP layer can ack fast either way.
    pub async fn handle_delivery(&self, body: &[u8], signature: Option<&str>) -> Result<usize> {
        let Some(signature) = signature else {
            return Err(Error::Auth("missing signature header"));
        };
        if !verify::signature_matches(body, signature, &self.config.app_secret) {
            return Err(Error::Auth("signature mismatch"));
        }

        let payload: WebhookPayload =
            serde_json::from_slice(body).map_err(|e| Error::Validation(e.to_string()))?;
        let messages = extract_inbound(&payload, &self.config.phone_number_id);

        let mut scheduled = 0;
        for msg in messages {
            let job_id = msg.job_key();
            let locks = Arc::clone(&self.locks);
            let live = Arc::clone(&self.live);
            let engine = Arc::clone(&self.engine);
            let policy = self.config.lock;
            let job = Box::pin(process_message(locks, live, engine, policy, msg));

            if self.queue.submit(&job_id, job).await? == Submit::Scheduled {
                scheduled += 1;
            }
        }
        Ok(scheduled)
    }
}

/// One processing step: serialize per user, then route bot vs. live.
///
/// A lock-wait timeout is a permanent drop — deliberate backpressure in
/// favour of latency; the provider already got its ack, so the critical
/// log entry is the only trace.
async fn process_message(
    locks: Arc<UserLockManager>,
    live: Arc<LiveModeService>,
    engine: Arc<dyn FlowEngine>,
    policy: LockPolicy,
    msg: InboundMessage,
) -> anyhow::Result<()> {
    let lock = match locks.acquire(&msg.user_id, policy.lease, policy.wait).await? {
        Acquire::Acquired(lock) => lock,
        Acquire::TimedOut => {
            error!(
                user_id = %msg.user_id,
                message_id = %msg.message_id,
                wait_secs = policy.wait.as_secs(),
                "user lock wait timed out; message dropped"
            );
            return Ok(());
        },
    };

    let routed = route(&live, engine.as_ref(), &msg).await;

    // The lease would expire on its own, but holding it for a failed
    // engine call would stall the user's queue for no benefit.
    if let Err(e) = lock.release().await {
        warn!(user_id = %msg.user_id, error = %e, "lock release failed");
    }

    routed
}

async fn route(
    live: &LiveModeService,
    engine: &dyn FlowEngine,
    msg: &InboundMessage,
) -> anyhow::Result<()> {
    if live.is_active(&msg.user_id).await? {
        debug!(user_id = %msg.user_id, "live mode active; forwarding to operator");
        live.forward_inbound(msg).await?;
    } else {
        engine.process_inbound(msg).await?;
    }
    Ok(())
}
