use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::capabilities::SignalDisplay;
use crate::models::{DisplayValue, Signal};

/// In-process device board: the last displayed value of each signal.
#[derive(Clone, Default)]
pub struct DisplayBoard {
    values: Arc<Mutex<HashMap<Signal, DisplayValue>>>,
}

impl DisplayBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn values(&self) -> HashMap<Signal, DisplayValue> {
        self.values.lock().await.clone()
    }
}

#[async_trait]
impl SignalDisplay for DisplayBoard {
    async fn current(&self, signal: Signal) -> Option<DisplayValue> {
        self.values.lock().await.get(&signal).copied()
    }

    async fn set(&self, signal: Signal, value: DisplayValue) {
        let label = match value {
            DisplayValue::On => "UP",
            DisplayValue::Off => "DOWN",
            DisplayValue::NotApplicable => "N/A",
        };
        info!(%signal, "state changed -> {}", label);
        self.values.lock().await.insert(signal, value);
    }
}
