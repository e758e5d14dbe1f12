// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host completion sink.
//
// A host runtime hands every call a promise-like object and expects it to be
// settled exactly once, from any thread. The trait consumes the box on
// settlement so a second resolve or reject cannot be expressed.

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

/// One-shot completion handle supplied by the host for a single call.
pub trait Promise: Send {
    /// Complete the call with a JSON payload.
    fn resolve(self: Box<Self>, value: Value);

    /// Fail the call with a host error kind (`FILE_ERROR`, `TIMEOUT`, ...)
    /// and a human-readable message.
    fn reject(self: Box<Self>, code: &str, message: &str);
}

/// How a call was settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Resolved(Value),
    Rejected { code: String, message: String },
}

/// Promise that forwards its settlement over a oneshot channel.
///
/// Used by in-process hosts such as the CLI, and by tests.
pub struct ChannelPromise {
    tx: oneshot::Sender<Settlement>,
}

impl ChannelPromise {
    /// Create a promise and the receiver its settlement arrives on.
    pub fn pair() -> (Box<dyn Promise>, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        (Box::new(Self { tx }), rx)
    }

    fn settle(self, settlement: Settlement) {
        if self.tx.send(settlement).is_err() {
            debug!("promise settled after the host stopped listening");
        }
    }
}

impl Promise for ChannelPromise {
    fn resolve(self: Box<Self>, value: Value) {
        self.settle(Settlement::Resolved(value));
    }

    fn reject(self: Box<Self>, code: &str, message: &str) {
        self.settle(Settlement::Rejected {
            code: code.to_owned(),
            message: message.to_owned(),
        });
    }
}
