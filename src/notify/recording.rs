//! Test notifier that records every message it is asked to send

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Notifier, NotifyPayload};

pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, NotifyPayload)>>,
    succeed: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            succeed: AtomicBool::new(true),
        }
    }

    /// Make subsequent sends report failure
    pub fn fail(&self) {
        self.succeed.store(false, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, NotifyPayload)> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, token: &str, payload: &NotifyPayload) -> bool {
        self.sent.lock().push((token.to_string(), payload.clone()));
        self.succeed.load(Ordering::SeqCst)
    }
}
