//! Explicit login state passed into every ledger call.

use super::{LedgerError, LedgerResult};

/// Who the ledger is acting for. Logged out is an ordinary value, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    email: Option<String>,
}

impl Session {
    pub fn logged_out() -> Self {
        Self { email: None }
    }

    /// Session for an email. Blank emails count as logged out.
    pub fn for_email(email: impl AsRef<str>) -> Self {
        let email = email.as_ref().trim();
        if email.is_empty() {
            Self::logged_out()
        } else {
            Self {
                email: Some(email.to_string()),
            }
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.email.is_some()
    }

    /// Email of the active user, or `NotAuthenticated`.
    pub(crate) fn require(&self) -> LedgerResult<&str> {
        self.email().ok_or(LedgerError::NotAuthenticated)
    }
}
