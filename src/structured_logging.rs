//! Structured logging and flow correlation

use uuid::Uuid;

/// Structured logger for protocol flow events
///
/// Every event carries the flow's `context_id` so the lines of one escrow
/// or signing session can be grouped.
#[derive(Debug, Clone)]
pub struct FlowLogger {
    context_id: String,
}

impl FlowLogger {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_submission(&self, operation: &str, signature: &str, instructions: usize, durable: bool) {
        tracing::info!(
            context_id = %self.context_id,
            operation = %operation,
            signature = %signature,
            instructions,
            durable,
            "Transaction submitted"
        );
    }

    pub fn log_confirmed(&self, operation: &str, signature: &str, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            operation = %operation,
            signature = %signature,
            latency_ms,
            "Transaction confirmed"
        );
    }

    pub fn log_rejected(&self, operation: &str, category: &str, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            operation = %operation,
            category = %category,
            error = %error,
            "Transaction rejected"
        );
    }

    pub fn log_simulation(&self, operation: &str, success: bool, units_consumed: Option<u64>) {
        tracing::debug!(
            context_id = %self.context_id,
            operation = %operation,
            success,
            units_consumed = ?units_consumed,
            "Simulation finished"
        );
    }

    pub fn log_account_created(&self, kind: &str, address: &str, size: usize, lamports: u64) {
        tracing::info!(
            context_id = %self.context_id,
            kind = %kind,
            address = %address,
            size,
            lamports,
            "Account created"
        );
    }

    pub fn log_nonce_operation(&self, operation: &str, nonce_account: &str, success: bool) {
        tracing::debug!(
            context_id = %self.context_id,
            operation = %operation,
            nonce_account = %nonce_account,
            success,
            "Nonce operation"
        );
    }
}

/// Correlation context for one protocol flow
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub request_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub operation: String,
    pub logger: FlowLogger,
}

impl FlowContext {
    pub fn new(operation: &str) -> Self {
        let request_id = Uuid::new_v4().to_string();
        Self {
            logger: FlowLogger::new(request_id.clone()),
            request_id,
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            operation: operation.to_string(),
        }
    }

    /// Child context sharing the request id
    pub fn child(&self, operation: &str) -> Self {
        Self {
            request_id: self.request_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_string(),
            logger: self.logger.clone(),
        }
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new("default")
    }
}
