//! Live-reload notifications.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;

/// A module that is currently broken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleFailure {
    /// Module key.
    pub module: String,
    /// Error message.
    pub message: String,
}

/// Sent to listeners after every pass that changed something.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadNotice {
    /// Output paths whose contents changed, appeared or disappeared.
    pub changed_paths: Vec<String>,
    /// Modules that failed in this pass.
    pub errors: Vec<ModuleFailure>,
}

impl ReloadNotice {
    /// Returns `true` if there is nothing to tell a client.
    pub fn is_empty(&self) -> bool {
        self.changed_paths.is_empty() && self.errors.is_empty()
    }

    /// One-line JSON form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Fan-out of reload notices to any number of channel listeners.
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<Sender<ReloadNotice>>,
}

impl Subscribers {
    /// Creates an empty subscriber list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new listener.
    pub fn subscribe(&mut self) -> Receiver<ReloadNotice> {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        rx
    }

    /// Sends `notice` to every listener. Listeners that hung up are dropped.
    /// Returns the number of listeners reached.
    pub fn publish(&mut self, notice: &ReloadNotice) -> usize {
        self.senders.retain(|tx| tx.send(notice.clone()).is_ok());
        self.senders.len()
    }

    /// Number of live listeners, as of the last publish.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Returns `true` if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
