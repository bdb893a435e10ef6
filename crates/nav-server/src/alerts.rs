//! Alert fan-out to connected clients.

use std::sync::Mutex;

use nav_core::{Alert, AlertKind, AlertSeverity};
use tokio::sync::broadcast;

const ALERT_CHANNEL_CAPACITY: usize = 64;

pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: Alert);
}

/// Broadcasts alerts and remembers the outstanding persistent one.
pub struct AlertHub {
    tx: broadcast::Sender<Alert>,
    persistent: Mutex<Option<Alert>>,
}

impl Default for AlertHub {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            tx,
            persistent: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }

    /// The persistent notice still on screen, if any.
    pub fn outstanding(&self) -> Option<Alert> {
        self.persistent.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn dismiss(&self) -> Option<Alert> {
        self.persistent.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Dismiss the outstanding notice only if it is of `kind`.
    pub fn dismiss_kind(&self, kind: AlertKind) -> Option<Alert> {
        let mut guard = self.persistent.lock().ok()?;
        if guard.as_ref().is_some_and(|alert| alert.kind == kind) {
            guard.take()
        } else {
            None
        }
    }
}

impl AlertSink for AlertHub {
    fn raise(&self, alert: Alert) {
        match alert.severity {
            AlertSeverity::Error => tracing::error!("Alert [{:?}]: {}", alert.kind, alert.message),
            AlertSeverity::Warning => tracing::warn!("Alert [{:?}]: {}", alert.kind, alert.message),
            AlertSeverity::Info => tracing::info!("Alert [{:?}]: {}", alert.kind, alert.message),
        }

        if alert.persistent {
            if let Ok(mut guard) = self.persistent.lock() {
                *guard = Some(alert.clone());
            }
        }

        // No subscribers is fine.
        let _ = self.tx.send(alert);
    }
}
