//! In-memory stub backend
//!
//! Records every envelope it is handed and replays scripted outcomes,
//! falling back to accept-all. Serves tests and development setups where
//! no real delivery is wanted.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

use super::super::message::OutboundEmail;
use super::super::transport::{SendOutcome, Transport};

#[derive(Default)]
pub struct StubBackend {
    sent: Mutex<Vec<OutboundEmail>>,
    script: Mutex<VecDeque<Result<SendOutcome>>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome for the next unscripted send (FIFO).
    pub fn push_outcome(&self, outcome: Result<SendOutcome>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Envelopes handed to this backend so far.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn send_mail(&self, email: &OutboundEmail) -> Result<SendOutcome> {
        debug!(
            "Stub send: uid {} to {:?} ({})",
            email.uid, email.to, email.subject
        );
        self.sent.lock().unwrap().push(email.clone());

        match self.script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(SendOutcome::accepted_all(email)),
        }
    }
}
