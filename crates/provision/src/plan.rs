//! Operator decisions for one provisioning run
//!
//! A [`Plan`] is produced once by the collector and only ever read
//! afterwards. Whether the operator chose to continue at all is carried by
//! [`Collected`]: a `Plan` exists only for a confirmed run.

use std::fmt;

/// A password that never shows up in `Debug` output or logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to the account collaborator
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// What to do with the root account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootAction {
    /// Delete and lock the root password
    RemovePassword,
    /// Replace the root password
    SetPassword(Secret),
}

/// An administrative account that does not exist yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: Secret,
    pub public_key: String,
    pub add_to_sudo: bool,
}

/// How to treat `authorized_keys` of an existing account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// The file becomes exactly this key
    Replace(String),
    /// Add this key unless already present
    Append(String),
    /// Leave the file alone
    Skip,
}

/// Create-or-update decision, resolved once against the account database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    CreateNew(NewUser),
    ExistingUser {
        username: String,
        key_action: KeyAction,
    },
}

impl UserAction {
    pub fn username(&self) -> &str {
        match self {
            Self::CreateNew(user) => &user.username,
            Self::ExistingUser { username, .. } => username,
        }
    }
}

/// Validated snapshot of every operator decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub root_action: RootAction,
    pub extend_partition: bool,
    pub hostname: String,
    pub user_action: UserAction,
    pub reboot: bool,
}

impl Plan {
    /// Human-readable rows for showing the plan back to the operator.
    ///
    /// Secrets are never included.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let root = match &self.root_action {
            RootAction::RemovePassword => "remove password".to_string(),
            RootAction::SetPassword(_) => "set new password".to_string(),
        };

        let user = match &self.user_action {
            UserAction::CreateNew(user) => format!(
                "create {}{}",
                user.username,
                if user.add_to_sudo { " (sudo)" } else { "" }
            ),
            UserAction::ExistingUser {
                username,
                key_action,
            } => {
                let keys = match key_action {
                    KeyAction::Replace(_) => "replace key",
                    KeyAction::Append(_) => "append key",
                    KeyAction::Skip => "keep keys",
                };
                format!("update {username} ({keys})")
            }
        };

        vec![
            ("Root account", root),
            ("Extend partition", yes_no(self.extend_partition)),
            ("Hostname", self.hostname.clone()),
            ("User", user),
            ("Reboot", yes_no(self.reboot)),
        ]
    }
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

/// Result of collecting operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    /// The operator declined to continue; nothing may be built or run
    Cancelled,
    /// The operator continued and every answer validated
    Confirmed(Plan),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        let rendered = format!("{:?}", RootAction::SetPassword(secret));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn summary_never_contains_passwords() {
        let plan = Plan {
            root_action: RootAction::SetPassword(Secret::new("rootpw")),
            extend_partition: true,
            hostname: "node1".into(),
            user_action: UserAction::CreateNew(NewUser {
                username: "ops".into(),
                password: Secret::new("s3cr3t"),
                public_key: "ssh-ed25519 AAAA".into(),
                add_to_sudo: true,
            }),
            reboot: false,
        };

        let rows = plan.summary();
        assert!(
            rows.iter()
                .all(|(_, v)| !v.contains("rootpw") && !v.contains("s3cr3t"))
        );
        assert!(rows.contains(&("User", "create ops (sudo)".to_string())));
        assert!(rows.contains(&("Extend partition", "yes".to_string())));
    }

    #[test]
    fn username_covers_both_branches() {
        let existing = UserAction::ExistingUser {
            username: "deploy".into(),
            key_action: KeyAction::Skip,
        };
        assert_eq!(existing.username(), "deploy");
    }
}
