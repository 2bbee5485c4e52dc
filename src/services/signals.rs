//! Observer registry for the two invitation events.
//!
//! `invite_invited` fires when a visitor opens a valid invitation link,
//! `invite_accepted` when an account is created from a key. Receivers run
//! synchronously in registration order; a panicking receiver is logged and
//! skipped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

use crate::db::models::auth::User;
use crate::db::models::invitation::InvitationKey;

pub type InvitedReceiver = Arc<dyn Fn(&InvitationKey) + Send + Sync>;
pub type AcceptedReceiver = Arc<dyn Fn(&User, &InvitationKey) + Send + Sync>;

#[derive(Default)]
pub struct InvitationSignals {
    invited: RwLock<Vec<InvitedReceiver>>,
    accepted: RwLock<Vec<AcceptedReceiver>>,
}

impl InvitationSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_invited<F>(&self, receiver: F)
    where
        F: Fn(&InvitationKey) + Send + Sync + 'static,
    {
        match self.invited.write() {
            Ok(mut receivers) => receivers.push(Arc::new(receiver)),
            Err(poisoned) => poisoned.into_inner().push(Arc::new(receiver)),
        }
    }

    pub fn connect_accepted<F>(&self, receiver: F)
    where
        F: Fn(&User, &InvitationKey) + Send + Sync + 'static,
    {
        match self.accepted.write() {
            Ok(mut receivers) => receivers.push(Arc::new(receiver)),
            Err(poisoned) => poisoned.into_inner().push(Arc::new(receiver)),
        }
    }

    pub fn send_invited(&self, invitation: &InvitationKey) {
        for receiver in snapshot(&self.invited) {
            if catch_unwind(AssertUnwindSafe(|| receiver(invitation))).is_err() {
                tracing::error!(key = %invitation.key, "invite_invited receiver panicked");
            }
        }
    }

    pub fn send_accepted(&self, user: &User, invitation: &InvitationKey) {
        for receiver in snapshot(&self.accepted) {
            if catch_unwind(AssertUnwindSafe(|| receiver(user, invitation))).is_err() {
                tracing::error!(
                    key = %invitation.key,
                    user_id = %user.id,
                    "invite_accepted receiver panicked"
                );
            }
        }
    }

    pub fn receiver_counts(&self) -> (usize, usize) {
        (snapshot(&self.invited).len(), snapshot(&self.accepted).len())
    }
}

// Receivers may connect further receivers, so the lock is released before
// any of them runs.
fn snapshot<T: Clone>(lock: &RwLock<Vec<T>>) -> Vec<T> {
    match lock.read() {
        Ok(receivers) => receivers.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Receivers installed at startup: structured log lines for both events.
pub fn connect_default_receivers(signals: &InvitationSignals) {
    signals.connect_invited(|invitation| {
        tracing::info!(
            key = %invitation.key,
            from_user_id = %invitation.from_user_id,
            "Invitation link opened"
        );
    });
    signals.connect_accepted(|user, invitation| {
        tracing::info!(
            key = %invitation.key,
            from_user_id = %invitation.from_user_id,
            user_id = %user.id,
            "Invitation accepted"
        );
    });
}
