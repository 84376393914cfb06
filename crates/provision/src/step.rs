//! Step model and the fixed provisioning sequence

use crate::plan::{KeyAction, NewUser, Plan, RootAction, UserAction};

/// Stable step identifiers, as they appear in reports
pub mod ids {
    pub const INSTALL_PACKAGES: &str = "install-packages";
    pub const REGENERATE_HOST_KEYS: &str = "regenerate-host-keys";
    pub const SYNC_HARDENING_CONFIG: &str = "sync-hardening-config";
    pub const RESTART_SSH: &str = "restart-ssh";
    pub const EXPAND_PARTITION: &str = "expand-partition";
    pub const SET_HOSTNAME: &str = "set-hostname";
    pub const CREATE_USER: &str = "create-user";
    pub const UPDATE_USER_KEYS: &str = "update-user-keys";
    pub const CONFIGURE_ROOT: &str = "configure-root";
    pub const REBOOT: &str = "reboot";
}

/// Marker recorded once the root filesystem has been grown
pub const PARTITION_MARKER: &str = "partition-expanded";

/// What a failing step does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Criticality {
    /// Stop the run after this step fails
    Fatal,
    /// Record the failure and continue
    #[default]
    Tolerant,
}

/// The unit of work a step performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InstallPackages { packages: Vec<String> },
    RegenerateHostKeys,
    SyncHardeningConfig,
    RestartService { service: String },
    ExpandRootPartition,
    SetHostname { hostname: String },
    CreateUser(NewUser),
    UpdateUserKeys { username: String, key_action: KeyAction },
    ConfigureRoot(RootAction),
    Reboot { delay_minutes: u32 },
}

/// A named, ordered, independently-failable unit of provisioning work
#[derive(Debug, Clone)]
pub struct Step {
    pub id: &'static str,
    pub description: String,
    /// Present means the step runs at most once per host
    pub idempotency_key: Option<&'static str>,
    pub action: Action,
    pub criticality: Criticality,
    /// Steps that must all have succeeded for this one to run
    pub depends_on: Vec<&'static str>,
}

impl Step {
    pub fn new(id: &'static str, description: impl Into<String>, action: Action) -> Self {
        Self {
            id,
            description: description.into(),
            idempotency_key: None,
            action,
            criticality: Criticality::Tolerant,
            depends_on: Vec::new(),
        }
    }

    pub fn guarded_by(mut self, key: &'static str) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn after(mut self, step_id: &'static str) -> Self {
        self.depends_on.push(step_id);
        self
    }
}

/// Site settings that shape the step sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSettings {
    pub packages: Vec<String>,
    pub ssh_service: String,
    /// A failed hardening-config validation aborts the run
    pub strict_validation: bool,
    pub reboot_delay_minutes: u32,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            packages: vec![
                "openssh-server".to_string(),
                "sudo".to_string(),
                "cloud-guest-utils".to_string(),
            ],
            ssh_service: "ssh".to_string(),
            strict_validation: false,
            reboot_delay_minutes: 1,
        }
    }
}

/// Build the fixed step sequence for a plan.
///
/// Order matters: the user and root steps assume the packages step already
/// provided the login service, and the restart only runs once fresh host keys
/// exist and the config synced and validated.
pub fn build_steps(plan: &Plan, settings: &StepSettings) -> Vec<Step> {
    let mut steps = Vec::with_capacity(9);

    steps.push(Step::new(
        ids::INSTALL_PACKAGES,
        format!("Install packages ({})", settings.packages.join(", ")),
        Action::InstallPackages {
            packages: settings.packages.clone(),
        },
    ));

    steps.push(Step::new(
        ids::REGENERATE_HOST_KEYS,
        "Regenerate SSH host keys",
        Action::RegenerateHostKeys,
    ));

    let sync_criticality = if settings.strict_validation {
        Criticality::Fatal
    } else {
        Criticality::Tolerant
    };
    steps.push(
        Step::new(
            ids::SYNC_HARDENING_CONFIG,
            "Install hardened SSH configuration",
            Action::SyncHardeningConfig,
        )
        .with_criticality(sync_criticality),
    );

    steps.push(
        Step::new(
            ids::RESTART_SSH,
            format!("Restart {} service", settings.ssh_service),
            Action::RestartService {
                service: settings.ssh_service.clone(),
            },
        )
        .after(ids::REGENERATE_HOST_KEYS)
        .after(ids::SYNC_HARDENING_CONFIG),
    );

    if plan.extend_partition {
        steps.push(
            Step::new(
                ids::EXPAND_PARTITION,
                "Expand root partition",
                Action::ExpandRootPartition,
            )
            .guarded_by(PARTITION_MARKER),
        );
    }

    steps.push(Step::new(
        ids::SET_HOSTNAME,
        format!("Set hostname to {}", plan.hostname),
        Action::SetHostname {
            hostname: plan.hostname.clone(),
        },
    ));

    steps.push(match &plan.user_action {
        UserAction::CreateNew(user) => Step::new(
            ids::CREATE_USER,
            format!(
                "Create user {}{}",
                user.username,
                if user.add_to_sudo { " with sudo" } else { "" }
            ),
            Action::CreateUser(user.clone()),
        ),
        UserAction::ExistingUser {
            username,
            key_action,
        } => Step::new(
            ids::UPDATE_USER_KEYS,
            format!("Update authorized keys for {username}"),
            Action::UpdateUserKeys {
                username: username.clone(),
                key_action: key_action.clone(),
            },
        ),
    });

    let root_description = match plan.root_action {
        RootAction::RemovePassword => "Remove and lock root password",
        RootAction::SetPassword(_) => "Set root password",
    };
    steps.push(Step::new(
        ids::CONFIGURE_ROOT,
        root_description,
        Action::ConfigureRoot(plan.root_action.clone()),
    ));

    if plan.reboot {
        steps.push(Step::new(
            ids::REBOOT,
            format!("Reboot in {} minute(s)", settings.reboot_delay_minutes),
            Action::Reboot {
                delay_minutes: settings.reboot_delay_minutes,
            },
        ));
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Secret;

    fn plan(extend_partition: bool, reboot: bool) -> Plan {
        Plan {
            root_action: RootAction::RemovePassword,
            extend_partition,
            hostname: "node1".into(),
            user_action: UserAction::CreateNew(NewUser {
                username: "ops".into(),
                password: Secret::new("s3cr3t"),
                public_key: "ssh-ed25519 AAAA".into(),
                add_to_sudo: true,
            }),
            reboot,
        }
    }

    fn ids_of(steps: &[Step]) -> Vec<&'static str> {
        steps.iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_full_sequence_order() {
        let steps = build_steps(&plan(true, true), &StepSettings::default());
        assert_eq!(
            ids_of(&steps),
            vec![
                ids::INSTALL_PACKAGES,
                ids::REGENERATE_HOST_KEYS,
                ids::SYNC_HARDENING_CONFIG,
                ids::RESTART_SSH,
                ids::EXPAND_PARTITION,
                ids::SET_HOSTNAME,
                ids::CREATE_USER,
                ids::CONFIGURE_ROOT,
                ids::REBOOT,
            ]
        );
    }

    #[test]
    fn test_declined_options_are_not_built() {
        let steps = build_steps(&plan(false, false), &StepSettings::default());
        let built = ids_of(&steps);
        assert!(!built.contains(&ids::EXPAND_PARTITION));
        assert!(!built.contains(&ids::REBOOT));
        assert_eq!(steps.len(), 7);
    }

    #[test]
    fn test_only_partition_is_guarded() {
        let steps = build_steps(&plan(true, false), &StepSettings::default());
        let guarded: Vec<_> = steps
            .iter()
            .filter_map(|s| s.idempotency_key.map(|k| (s.id, k)))
            .collect();
        assert_eq!(guarded, vec![(ids::EXPAND_PARTITION, PARTITION_MARKER)]);
    }

    #[test]
    fn test_restart_depends_on_keys_and_sync() {
        let steps = build_steps(&plan(false, false), &StepSettings::default());
        let restart = steps.iter().find(|s| s.id == ids::RESTART_SSH).unwrap();
        assert_eq!(
            restart.depends_on,
            vec![ids::REGENERATE_HOST_KEYS, ids::SYNC_HARDENING_CONFIG]
        );
        assert!(
            steps
                .iter()
                .filter(|s| s.id != ids::RESTART_SSH)
                .all(|s| s.depends_on.is_empty())
        );
    }

    #[test]
    fn test_strict_validation_makes_sync_fatal() {
        let lenient = build_steps(&plan(false, false), &StepSettings::default());
        assert!(lenient.iter().all(|s| s.criticality == Criticality::Tolerant));

        let strict = StepSettings {
            strict_validation: true,
            ..Default::default()
        };
        let steps = build_steps(&plan(false, false), &strict);
        let sync = steps
            .iter()
            .find(|s| s.id == ids::SYNC_HARDENING_CONFIG)
            .unwrap();
        assert_eq!(sync.criticality, Criticality::Fatal);
    }

    #[test]
    fn test_existing_user_builds_key_update() {
        let mut p = plan(false, false);
        p.user_action = UserAction::ExistingUser {
            username: "deploy".into(),
            key_action: KeyAction::Append("ssh-ed25519 BBBB".into()),
        };
        let steps = build_steps(&p, &StepSettings::default());
        let built = ids_of(&steps);
        assert!(built.contains(&ids::UPDATE_USER_KEYS));
        assert!(!built.contains(&ids::CREATE_USER));
    }
}
