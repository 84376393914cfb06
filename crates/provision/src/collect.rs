//! Operator interview
//!
//! Asks every question up front and validates each answer before the next
//! one, so the orchestrator only ever sees a complete [`Plan`].

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::context::{Accounts, Prompter};
use crate::plan::{Collected, KeyAction, NewUser, Plan, RootAction, Secret, UserAction};

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").expect("username pattern is valid")
});

const ROOT_CHOICES: [&str; 2] = ["Remove root password", "Set a new root password"];
const KEY_CHOICES: [&str; 3] = [
    "Replace authorized keys",
    "Append to authorized keys",
    "Leave keys unchanged",
];

/// Gathers operator decisions into a [`Plan`]
pub struct ConfigCollector<'a> {
    prompter: &'a mut dyn Prompter,
    accounts: &'a dyn Accounts,
}

impl<'a> ConfigCollector<'a> {
    pub fn new(prompter: &'a mut dyn Prompter, accounts: &'a dyn Accounts) -> Self {
        Self { prompter, accounts }
    }

    /// Run the interview.
    ///
    /// Declining the first question is the only way to cancel; nothing else
    /// is asked after it.
    pub fn collect(&mut self) -> Result<Collected> {
        if !self
            .prompter
            .confirm("This will reconfigure SSH, accounts and the hostname. Continue?", false)?
        {
            log::info!("Operator declined to continue");
            return Ok(Collected::Cancelled);
        }

        let root_action = self.root_action()?;
        let extend_partition = self
            .prompter
            .confirm("Extend the root partition to fill the disk?", false)?;
        let hostname = self.hostname()?;
        let user_action = self.user_action()?;
        let reboot = self.prompter.confirm("Reboot when finished?", false)?;

        Ok(Collected::Confirmed(Plan {
            root_action,
            extend_partition,
            hostname,
            user_action,
            reboot,
        }))
    }

    fn root_action(&mut self) -> Result<RootAction> {
        let choice = self.prompter.select("Root account", &ROOT_CHOICES, 0)?;
        if choice == 0 {
            return Ok(RootAction::RemovePassword);
        }
        let password = self.non_empty_password("New root password")?;
        Ok(RootAction::SetPassword(password))
    }

    fn hostname(&mut self) -> Result<String> {
        let current = match self.accounts.current_hostname() {
            Ok(name) => Some(name.trim().to_lowercase()).filter(|n| !n.is_empty()),
            Err(e) => {
                log::warn!("Could not read current hostname: {e:#}");
                None
            }
        };

        loop {
            let answer = self
                .prompter
                .input("Hostname", current.as_deref())?
                .trim()
                .to_lowercase();

            let hostname = match (answer.is_empty(), &current) {
                (true, Some(current)) => current.clone(),
                _ => answer,
            };

            match validate_hostname(&hostname) {
                Ok(()) => return Ok(hostname),
                Err(reason) => self.prompter.warn(&reason),
            }
        }
    }

    fn user_action(&mut self) -> Result<UserAction> {
        let username = loop {
            let answer = self.prompter.input("Admin username", None)?;
            let answer = answer.trim();
            match validate_username(answer) {
                Ok(()) => break answer.to_string(),
                Err(reason) => self.prompter.warn(&reason),
            }
        };

        if self.accounts.user_exists(&username) {
            log::debug!("User '{username}' exists, asking for key handling");
            let choice = self
                .prompter
                .select(&format!("User {username} exists"), &KEY_CHOICES, 1)?;
            let key_action = match choice {
                0 => KeyAction::Replace(self.public_key()?),
                1 => KeyAction::Append(self.public_key()?),
                _ => KeyAction::Skip,
            };
            return Ok(UserAction::ExistingUser {
                username,
                key_action,
            });
        }

        let password = self.non_empty_password(&format!("Password for {username}"))?;
        let public_key = self.public_key()?;
        let add_to_sudo = self
            .prompter
            .confirm(&format!("Add {username} to sudo?"), true)?;

        Ok(UserAction::CreateNew(NewUser {
            username,
            password,
            public_key,
            add_to_sudo,
        }))
    }

    fn non_empty_password(&mut self, prompt: &str) -> Result<Secret> {
        loop {
            let password = Secret::new(
                self.prompter
                    .password(prompt)
                    .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?,
            );
            if !password.is_empty() {
                return Ok(password);
            }
            self.prompter.warn("Password must not be empty");
        }
    }

    fn public_key(&mut self) -> Result<String> {
        loop {
            let key = self.prompter.input("SSH public key", None)?;
            let key = key.trim();
            match validate_public_key(key) {
                Ok(()) => return Ok(key.to_string()),
                Err(reason) => self.prompter.warn(&reason),
            }
        }
    }
}

/// RFC 1123 host name: dot-separated labels of `[a-z0-9-]`
pub fn validate_hostname(hostname: &str) -> std::result::Result<(), String> {
    if hostname.is_empty() {
        return Err("Hostname must not be empty".to_string());
    }
    if hostname.len() > 253 {
        return Err("Hostname must be at most 253 characters".to_string());
    }

    for label in hostname.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(format!(
                "Invalid hostname '{hostname}': labels must be 1-63 characters"
            ));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(format!(
                "Invalid hostname '{hostname}': use letters, digits and '-'"
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!(
                "Invalid hostname '{hostname}': labels cannot start or end with '-'"
            ));
        }
    }

    Ok(())
}

pub fn validate_username(username: &str) -> std::result::Result<(), String> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(format!(
            "Invalid username '{username}': start with a lowercase letter or '_', \
             then up to 31 of [a-z0-9_-]"
        ))
    }
}

pub fn validate_public_key(key: &str) -> std::result::Result<(), String> {
    if key.trim().is_empty() {
        return Err("Public key must not be empty".to_string());
    }
    if key.contains('\n') || key.contains('\r') {
        return Err("Public key must be a single line".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};

    #[derive(Debug, Clone)]
    enum Answer {
        Confirm(bool),
        Input(&'static str),
        Password(&'static str),
        Select(usize),
    }

    /// Plays back answers in order and records every question asked
    #[derive(Default)]
    struct Script {
        answers: VecDeque<Answer>,
        asked: Vec<String>,
        warnings: Vec<String>,
    }

    impl Script {
        fn new(answers: &[Answer]) -> Self {
            Self {
                answers: answers.iter().cloned().collect(),
                ..Self::default()
            }
        }

        fn next(&mut self, prompt: &str) -> Answer {
            self.asked.push(prompt.to_string());
            self.answers
                .pop_front()
                .unwrap_or_else(|| panic!("no scripted answer for '{prompt}'"))
        }
    }

    impl Prompter for Script {
        fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool> {
            match self.next(prompt) {
                Answer::Confirm(value) => Ok(value),
                other => panic!("expected confirm for '{prompt}', got {other:?}"),
            }
        }

        fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
            match self.next(prompt) {
                Answer::Input("") => Ok(default.unwrap_or_default().to_string()),
                Answer::Input(value) => Ok(value.to_string()),
                other => panic!("expected input for '{prompt}', got {other:?}"),
            }
        }

        fn password(&mut self, prompt: &str) -> Result<String> {
            match self.next(prompt) {
                Answer::Password(value) => Ok(value.to_string()),
                other => panic!("expected password for '{prompt}', got {other:?}"),
            }
        }

        fn select(&mut self, prompt: &str, _items: &[&str], _default: usize) -> Result<usize> {
            match self.next(prompt) {
                Answer::Select(index) => Ok(index),
                other => panic!("expected select for '{prompt}', got {other:?}"),
            }
        }

        fn warn(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }
    }

    struct Host {
        users: HashSet<&'static str>,
        hostname: &'static str,
    }

    impl Host {
        fn with_users(users: &[&'static str]) -> Self {
            Self {
                users: users.iter().copied().collect(),
                hostname: "debian",
            }
        }
    }

    impl Accounts for Host {
        fn user_exists(&self, username: &str) -> bool {
            self.users.contains(username)
        }

        fn current_hostname(&self) -> Result<String> {
            Ok(self.hostname.to_string())
        }
    }

    use Answer::{Confirm, Input, Password, Select};

    #[test]
    fn test_declining_asks_nothing_else() {
        let mut script = Script::new(&[Confirm(false)]);
        let host = Host::with_users(&[]);

        let collected = ConfigCollector::new(&mut script, &host).collect().unwrap();

        assert_eq!(collected, Collected::Cancelled);
        assert_eq!(script.asked.len(), 1);
    }

    #[test]
    fn test_new_user_plan() {
        let mut script = Script::new(&[
            Confirm(true),
            Select(0),
            Confirm(false),
            Input("node1"),
            Input("ops"),
            Password(""),
            Password("s3cr3t"),
            Input("ssh-ed25519 AAAA"),
            Confirm(true),
            Confirm(false),
        ]);
        let host = Host::with_users(&["root"]);

        let collected = ConfigCollector::new(&mut script, &host).collect().unwrap();

        let Collected::Confirmed(plan) = collected else {
            panic!("expected a plan");
        };
        assert_eq!(plan.root_action, RootAction::RemovePassword);
        assert!(!plan.extend_partition);
        assert_eq!(plan.hostname, "node1");
        assert_eq!(
            plan.user_action,
            UserAction::CreateNew(NewUser {
                username: "ops".into(),
                password: Secret::new("s3cr3t"),
                public_key: "ssh-ed25519 AAAA".into(),
                add_to_sudo: true,
            })
        );
        assert!(!plan.reboot);
        assert_eq!(script.warnings, vec!["Password must not be empty"]);
    }

    #[test]
    fn test_empty_hostname_keeps_current() {
        let mut script = Script::new(&[
            Confirm(true),
            Select(0),
            Confirm(true),
            Input(""),
            Input("deploy"),
            Select(2),
            Confirm(true),
        ]);
        let host = Host::with_users(&["deploy"]);

        let Collected::Confirmed(plan) = ConfigCollector::new(&mut script, &host).collect().unwrap()
        else {
            panic!("expected a plan");
        };

        assert_eq!(plan.hostname, "debian");
        assert_eq!(
            plan.user_action,
            UserAction::ExistingUser {
                username: "deploy".into(),
                key_action: KeyAction::Skip,
            }
        );
        assert!(plan.extend_partition);
        assert!(plan.reboot);
    }

    #[test]
    fn test_existing_user_append_key() {
        let mut script = Script::new(&[
            Confirm(true),
            Select(1),
            Password("rootpw"),
            Confirm(false),
            Input("node1"),
            Input("deploy"),
            Select(1),
            Input("   "),
            Input("ssh-ed25519 BBBB"),
            Confirm(false),
        ]);
        let host = Host::with_users(&["deploy"]);

        let Collected::Confirmed(plan) = ConfigCollector::new(&mut script, &host).collect().unwrap()
        else {
            panic!("expected a plan");
        };

        assert_eq!(plan.root_action, RootAction::SetPassword(Secret::new("rootpw")));
        assert_eq!(
            plan.user_action,
            UserAction::ExistingUser {
                username: "deploy".into(),
                key_action: KeyAction::Append("ssh-ed25519 BBBB".into()),
            }
        );
        assert_eq!(script.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_answers_are_reprompted() {
        let mut script = Script::new(&[
            Confirm(true),
            Select(0),
            Confirm(false),
            Input("-bad-"),
            Input("Node1"),
            Input("Root"),
            Input("ops"),
            Password("pw"),
            Input("ssh-ed25519 AAAA"),
            Confirm(false),
            Confirm(false),
        ]);
        let host = Host::with_users(&[]);

        let Collected::Confirmed(plan) = ConfigCollector::new(&mut script, &host).collect().unwrap()
        else {
            panic!("expected a plan");
        };

        assert_eq!(plan.hostname, "node1");
        assert_eq!(plan.user_action.username(), "ops");
        assert_eq!(script.warnings.len(), 2);
    }

    #[test]
    fn test_validate_hostname() {
        assert!(validate_hostname("node1").is_ok());
        assert!(validate_hostname("web-01.example.com").is_ok());
        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("-node").is_err());
        assert!(validate_hostname("node_1").is_err());
        assert!(validate_hostname("a..b").is_err());
        assert!(validate_hostname(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ops").is_ok());
        assert!(validate_username("_svc-1").is_ok());
        assert!(validate_username("1ops").is_err());
        assert!(validate_username("Ops").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_public_key() {
        assert!(validate_public_key("ssh-ed25519 AAAA user@host").is_ok());
        assert!(validate_public_key("  ").is_err());
        assert!(validate_public_key("ssh-rsa A\nssh-rsa B").is_err());
    }
}
