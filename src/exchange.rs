//! The `Exchange` capability consumed by the OMS (§6). Wire-level
//! authentication, signing, and transport are explicitly out of scope; this
//! module defines the trait boundary plus a single in-memory implementation
//! used by tests and as a runnable default.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::Order;

#[derive(Debug, Clone)]
pub enum ExchangeError {
    Transient(String),
    Auth(String),
    Validation(String),
    RateLimited(String),
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::Transient(m) => write!(f, "transient exchange error: {m}"),
            ExchangeError::Auth(m) => write!(f, "authentication error: {m}"),
            ExchangeError::Validation(m) => write!(f, "validation error: {m}"),
            ExchangeError::RateLimited(m) => write!(f, "rate limited: {m}"),
        }
    }
}

impl std::error::Error for ExchangeError {}

/// Opaque success acknowledgement. OMS does not inspect it beyond
/// error/non-error; authoritative state always comes back through the
/// order-update stream.
#[derive(Debug, Clone, Default)]
pub struct ExchangeAck {
    pub oid: Option<String>,
}

#[async_trait]
pub trait Exchange: Send + Sync {
    async fn create_order(&self, order: Order) -> Result<ExchangeAck, ExchangeError>;
    /// Requires `order.oid` to be set.
    async fn amend_order(&self, order: Order) -> Result<ExchangeAck, ExchangeError>;
    async fn cancel_order(&self, order: Order) -> Result<ExchangeAck, ExchangeError>;
    async fn bulk_cancel_order(&self, orders: Vec<Order>) -> Vec<Result<ExchangeAck, ExchangeError>>;
    async fn cancel_all_orders(&self, symbol: &str) -> Result<ExchangeAck, ExchangeError>;
    /// Called once at boot.
    async fn load_markets(&self) -> Result<(), ExchangeError>;
}

/// In-memory stand-in for a live exchange driver. Accepts every order
/// unconditionally; useful for tests and as the default runnable backend
/// since the real REST/WebSocket driver for any given venue is out of scope
/// here (§1).
#[derive(Default)]
pub struct SimExchange {
    next_oid: Mutex<u64>,
    open_orders: Mutex<HashMap<String, Order>>,
}

impl SimExchange {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_oid(&self) -> String {
        let mut guard = self.next_oid.lock().unwrap();
        *guard += 1;
        format!("sim-{}", *guard)
    }
}

#[async_trait]
impl Exchange for SimExchange {
    async fn create_order(&self, order: Order) -> Result<ExchangeAck, ExchangeError> {
        if order.amount <= 0.0 || order.price <= 0.0 {
            return Err(ExchangeError::Validation(format!(
                "invalid order amount/price: {:?}",
                order
            )));
        }
        let oid = self.fresh_oid();
        self.open_orders.lock().unwrap().insert(oid.clone(), order);
        Ok(ExchangeAck { oid: Some(oid) })
    }

    async fn amend_order(&self, order: Order) -> Result<ExchangeAck, ExchangeError> {
        let oid = match &order.oid {
            Some(oid) => oid.clone(),
            None => return Err(ExchangeError::Validation("amend_order requires oid".into())),
        };
        let mut orders = self.open_orders.lock().unwrap();
        if !orders.contains_key(&oid) {
            return Err(ExchangeError::Validation(format!("unknown oid {oid}")));
        }
        orders.insert(oid.clone(), order);
        Ok(ExchangeAck { oid: Some(oid) })
    }

    async fn cancel_order(&self, order: Order) -> Result<ExchangeAck, ExchangeError> {
        if let Some(oid) = &order.oid {
            self.open_orders.lock().unwrap().remove(oid);
        }
        Ok(ExchangeAck::default())
    }

    async fn bulk_cancel_order(&self, orders: Vec<Order>) -> Vec<Result<ExchangeAck, ExchangeError>> {
        let mut results = Vec::with_capacity(orders.len());
        for order in orders {
            results.push(self.cancel_order(order).await);
        }
        results
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<ExchangeAck, ExchangeError> {
        let mut orders = self.open_orders.lock().unwrap();
        orders.retain(|_, o| o.symbol != symbol);
        Ok(ExchangeAck::default())
    }

    async fn load_markets(&self) -> Result<(), ExchangeError> {
        Ok(())
    }
}
