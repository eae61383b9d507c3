//! User accounts (event-sourced).
//!
//! Passwords reach this module already hashed; the aggregate never sees
//! plain text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oficina_core::{Aggregate, AggregateRoot, DomainError, Entity, UserId};
use oficina_events::Event;

use crate::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    /// Cannot log in; existing tokens are refused by the API.
    Suspended,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => f.write_str("ativo"),
            UserStatus::Suspended => f.write_str("suspenso"),
        }
    }
}

/// Aggregate root: User.
///
/// Invariants: e-mail is lower-cased and contains `@`; the role is one of
/// the built-in roles; a user cannot suspend themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    email: String,
    display_name: String,
    role: Role,
    status: UserStatus,
    password_hash: String,
    must_change_password: bool,
    version: u64,
    created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            email: String::new(),
            display_name: String::new(),
            role: Role::mechanic(),
            status: UserStatus::Active,
            password_hash: String::new(),
            must_change_password: false,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn must_change_password(&self) -> bool {
        self.must_change_password
    }

    fn ensure_exists(&self, user_id: UserId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("usuário não encontrado"));
        }
        if self.id != user_id {
            return Err(DomainError::invariant("user_id mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    /// Force a password change on first login.
    pub must_change_password: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendUser {
    pub user_id: UserId,
    pub actor: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Create(CreateUser),
    ChangePassword(ChangePassword),
    Suspend(SuspendUser),
    Activate(ActivateUser),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub must_change_password: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSuspended {
    pub user_id: UserId,
    pub actor: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivated {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Created(UserCreated),
    PasswordChanged(PasswordChanged),
    Suspended(UserSuspended),
    Activated(UserActivated),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "auth.user.created",
            UserEvent::PasswordChanged(_) => "auth.user.password_changed",
            UserEvent::Suspended(_) => "auth.user.suspended",
            UserEvent::Activated(_) => "auth.user.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Created(e) => e.occurred_at,
            UserEvent::PasswordChanged(e) => e.occurred_at,
            UserEvent::Suspended(e) => e.occurred_at,
            UserEvent::Activated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Created(e) => {
                self.id = e.user_id;
                self.email = e.email.clone();
                self.display_name = e.display_name.clone();
                self.role = e.role.clone();
                self.password_hash = e.password_hash.clone();
                self.must_change_password = e.must_change_password;
                self.status = UserStatus::Active;
                self.created = true;
            }
            UserEvent::PasswordChanged(e) => {
                self.password_hash = e.password_hash.clone();
                self.must_change_password = false;
            }
            UserEvent::Suspended(_) => self.status = UserStatus::Suspended,
            UserEvent::Activated(_) => self.status = UserStatus::Active,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Create(cmd) => self.handle_create(cmd),
            UserCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            UserCommand::Suspend(cmd) => self.handle_suspend(cmd),
            UserCommand::Activate(cmd) => self.handle_activate(cmd),
        }
    }
}

impl User {
    fn handle_create(&self, cmd: &CreateUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("usuário já existe"));
        }
        let email = cmd.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("e-mail inválido"));
        }
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("nome é obrigatório"));
        }
        if !cmd.role.is_known() {
            return Err(DomainError::validation(format!("perfil desconhecido: {}", cmd.role)));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("senha é obrigatória"));
        }

        Ok(vec![UserEvent::Created(UserCreated {
            user_id: cmd.user_id,
            email,
            display_name: cmd.display_name.trim().to_string(),
            role: cmd.role.clone(),
            password_hash: cmd.password_hash.clone(),
            must_change_password: cmd.must_change_password,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_password(&self, cmd: &ChangePassword) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.user_id)?;
        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("usuário suspenso"));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("senha é obrigatória"));
        }
        Ok(vec![UserEvent::PasswordChanged(PasswordChanged {
            user_id: cmd.user_id,
            password_hash: cmd.password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.user_id)?;
        if cmd.actor == cmd.user_id {
            return Err(DomainError::invariant("usuário não pode suspender a si mesmo"));
        }
        if self.status == UserStatus::Suspended {
            return Ok(vec![]);
        }
        Ok(vec![UserEvent::Suspended(UserSuspended {
            user_id: cmd.user_id,
            actor: cmd.actor,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.user_id)?;
        if self.status == UserStatus::Active {
            return Ok(vec![]);
        }
        Ok(vec![UserEvent::Activated(UserActivated {
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_cmd(user_id: UserId, email: &str, role: Role) -> UserCommand {
        UserCommand::Create(CreateUser {
            user_id,
            email: email.to_string(),
            display_name: " Ana Souza ".to_string(),
            role,
            password_hash: "$argon2id$stub".to_string(),
            must_change_password: true,
            occurred_at: Utc::now(),
        })
    }

    fn created(role: Role) -> User {
        let id = UserId::new();
        let mut user = User::empty(id);
        let events = user.handle(&create_cmd(id, "Ana@Oficina.com", role)).unwrap();
        user.apply(&events[0]);
        user
    }

    fn run(user: &mut User, cmd: UserCommand) -> Result<usize, DomainError> {
        let events = user.handle(&cmd)?;
        for e in &events {
            user.apply(e);
        }
        Ok(events.len())
    }

    #[test]
    fn create_normalises_email_and_name() {
        let user = created(Role::mechanic());
        assert_eq!(user.email(), "ana@oficina.com");
        assert_eq!(user.display_name(), "Ana Souza");
        assert!(user.must_change_password());
    }

    #[test]
    fn create_rejects_bad_email_and_unknown_role() {
        let id = UserId::new();
        let user = User::empty(id);
        assert!(matches!(
            user.handle(&create_cmd(id, "sem-arroba", Role::mechanic())),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            user.handle(&create_cmd(id, "a@b.com", Role::new("comum"))),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn password_change_clears_forced_change_flag() {
        let mut user = created(Role::manager());
        let id = *AggregateRoot::id(&user);
        run(
            &mut user,
            UserCommand::ChangePassword(ChangePassword {
                user_id: id,
                password_hash: "$argon2id$other".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(!user.must_change_password());
        assert_eq!(user.password_hash(), "$argon2id$other");
    }

    #[test]
    fn suspend_and_activate_are_idempotent() {
        let mut user = created(Role::mechanic());
        let id = *AggregateRoot::id(&user);
        let admin = UserId::new();
        let suspend = || {
            UserCommand::Suspend(SuspendUser {
                user_id: id,
                actor: admin,
                reason: "Desligado".to_string(),
                occurred_at: Utc::now(),
            })
        };

        assert_eq!(run(&mut user, suspend()).unwrap(), 1);
        assert_eq!(run(&mut user, suspend()).unwrap(), 0);
        assert_eq!(user.status(), UserStatus::Suspended);

        let activate = UserCommand::Activate(ActivateUser {
            user_id: id,
            occurred_at: Utc::now(),
        });
        assert_eq!(run(&mut user, activate).unwrap(), 1);
        assert_eq!(user.status(), UserStatus::Active);
    }

    #[test]
    fn cannot_suspend_self() {
        let user = created(Role::admin());
        let id = *AggregateRoot::id(&user);
        let err = user
            .handle(&UserCommand::Suspend(SuspendUser {
                user_id: id,
                actor: id,
                reason: "teste".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
