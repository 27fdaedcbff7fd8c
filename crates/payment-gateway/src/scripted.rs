//! In-process gateway for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use provider_core::{GatewayError, GatewayOrder, PaymentGateway, PaymentStatus};

#[derive(Default)]
struct Script {
    /// Answers consumed one per status check, per order.
    queued: HashMap<String, VecDeque<Result<PaymentStatus, GatewayError>>>,
    /// Answer once an order's queue is empty.
    sticky: HashMap<String, PaymentStatus>,
    created: Vec<(String, i64)>,
    create_failure: Option<GatewayError>,
}

/// A [`PaymentGateway`] whose answers are set by the test.
///
/// Orders are pending until told otherwise. Orders expire ten minutes
/// after creation.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
    status_checks: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `create_order` call with `error`.
    pub fn failing_create(error: GatewayError) -> Self {
        let gateway = Self::new();
        if let Ok(mut script) = gateway.script.lock() {
            script.create_failure = Some(error);
        }
        gateway
    }

    /// Answer every later status check for `order_id` with `status`.
    pub fn set_status(&self, order_id: &str, status: PaymentStatus) {
        if let Ok(mut script) = self.script.lock() {
            script.sticky.insert(order_id.to_string(), status);
        }
    }

    /// Queue one answer for `order_id`, used before the sticky status.
    pub fn push_status(&self, order_id: &str, answer: Result<PaymentStatus, GatewayError>) {
        if let Ok(mut script) = self.script.lock() {
            script
                .queued
                .entry(order_id.to_string())
                .or_default()
                .push_back(answer);
        }
    }

    /// Orders created so far as `(order_id, amount)`.
    pub fn orders(&self) -> Vec<(String, i64)> {
        self.script
            .lock()
            .map(|s| s.created.clone())
            .unwrap_or_default()
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_order(&self, order_id: &str, amount: i64) -> Result<GatewayOrder, GatewayError> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| GatewayError::Unavailable("script poisoned".to_string()))?;
        if let Some(error) = &script.create_failure {
            return Err(error.clone());
        }
        script.created.push((order_id.to_string(), amount));

        Ok(GatewayOrder {
            pay_ref: format!("QR-{}", order_id),
            checkout_url: Some(format!("https://pay.test/{}", order_id)),
            expires_at: Some(Utc::now() + Duration::minutes(10)),
        })
    }

    async fn check_status(&self, order_id: &str) -> Result<PaymentStatus, GatewayError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        let mut script = self
            .script
            .lock()
            .map_err(|_| GatewayError::Unavailable("script poisoned".to_string()))?;

        if let Some(answer) = script.queued.get_mut(order_id).and_then(VecDeque::pop_front) {
            return answer;
        }
        Ok(script
            .sticky
            .get(order_id)
            .copied()
            .unwrap_or(PaymentStatus::Pending))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
