//! Account reducer: registration, login, profile, password and client profile.
//!
//! Form rules are checked while reducing. Everything that needs storage or
//! bcrypt runs in the effect; hashing and verifying go through
//! `spawn_blocking` so they never stall the runtime's worker threads.

use chrono::{DateTime, Duration, Utc};
use naviera_core::{async_effect, effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use naviera_web::FieldErrors;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::forms::{check_new_password, ClientForm, PasswordChangeForm, ProfileForm, RegistrationForm};
use crate::auth::password::PasswordHasher;
use crate::auth::session::{Session, SessionId, SessionStore};
use crate::error::{NavieraError, Result};
use crate::storage::{
    AccountRepository, Storage, StorageError, CLIENT_DNI_UNIQUE, CLIENT_USER_UNIQUE, EMAIL_UNIQUE,
    USERNAME_UNIQUE,
};
use crate::types::{Client, ClientId, User, UserId};

/// Message for every failed login, whatever the cause.
pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Who is logging in, and from where.
#[derive(Clone, Debug)]
pub struct LoginAttempt {
    /// Username or email
    pub identifier: String,
    /// Password
    pub password: String,
    /// Client address
    pub ip: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
}

/// Actions for the account reducer.
///
/// Every command carries a `request` id that its outcome echoes, so a caller
/// can wait for the answer to its own command.
#[derive(Clone, Debug)]
pub enum AccountAction {
    // Commands
    /// Sign up
    Register {
        /// Correlation id
        request: Uuid,
        /// Form
        form: RegistrationForm,
    },

    /// Log in and open a session
    Login {
        /// Correlation id
        request: Uuid,
        /// Credentials and client details
        attempt: LoginAttempt,
    },

    /// Change the password; other sessions are closed
    ChangePassword {
        /// Correlation id
        request: Uuid,
        /// Account
        user_id: UserId,
        /// Session to keep open
        current_session: SessionId,
        /// Form
        form: PasswordChangeForm,
    },

    /// Edit the profile
    UpdateProfile {
        /// Correlation id
        request: Uuid,
        /// Account
        user_id: UserId,
        /// Form
        form: ProfileForm,
    },

    /// Attach a client profile to the account
    CreateClient {
        /// Correlation id
        request: Uuid,
        /// Account
        user_id: UserId,
        /// Form
        form: ClientForm,
    },

    // Events
    /// Account created
    Registered {
        /// Correlation id
        request: Uuid,
        /// New user
        user: User,
    },

    /// Session opened
    LoggedIn {
        /// Correlation id
        request: Uuid,
        /// User
        user: User,
        /// New session
        session: Session,
    },

    /// Password replaced
    PasswordChanged {
        /// Correlation id
        request: Uuid,
        /// Account
        user_id: UserId,
        /// Other sessions closed
        sessions_revoked: usize,
    },

    /// Profile saved
    ProfileUpdated {
        /// Correlation id
        request: Uuid,
        /// User after the change
        user: User,
    },

    /// Client profile created
    ClientCreated {
        /// Correlation id
        request: Uuid,
        /// New client
        client: Client,
    },

    /// A command was refused
    Rejected {
        /// Correlation id
        request: Uuid,
        /// Why
        error: NavieraError,
    },
}

impl AccountAction {
    /// Correlation id of the command or outcome.
    #[must_use]
    pub const fn request(&self) -> Uuid {
        match self {
            Self::Register { request, .. }
            | Self::Login { request, .. }
            | Self::ChangePassword { request, .. }
            | Self::UpdateProfile { request, .. }
            | Self::CreateClient { request, .. }
            | Self::Registered { request, .. }
            | Self::LoggedIn { request, .. }
            | Self::PasswordChanged { request, .. }
            | Self::ProfileUpdated { request, .. }
            | Self::ClientCreated { request, .. }
            | Self::Rejected { request, .. } => *request,
        }
    }

    /// Whether this is the outcome of the command with `request`.
    #[must_use]
    pub fn is_outcome_for(&self, request: Uuid) -> bool {
        !matches!(
            self,
            Self::Register { .. }
                | Self::Login { .. }
                | Self::ChangePassword { .. }
                | Self::UpdateProfile { .. }
                | Self::CreateClient { .. }
        ) && self.request() == request
    }
}

// ============================================================================
// State
// ============================================================================

/// Running totals.
#[derive(Clone, Debug, Default)]
pub struct AccountState {
    /// Accounts created since start
    pub registered: u64,
    /// Successful logins since start
    pub logins: u64,
    /// Refused commands since start
    pub rejected: u64,
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the account reducer
#[derive(Clone)]
pub struct AccountEnvironment {
    /// Users and clients
    pub accounts: Arc<dyn AccountRepository>,
    /// Sessions
    pub sessions: Arc<dyn SessionStore>,
    /// bcrypt settings
    pub hasher: PasswordHasher,
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Lifetime of new sessions
    pub session_ttl: Duration,
}

impl AccountEnvironment {
    /// Creates a new `AccountEnvironment`
    #[must_use]
    pub fn new(
        storage: &Storage,
        sessions: Arc<dyn SessionStore>,
        hasher: PasswordHasher,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            accounts: storage.accounts.clone(),
            sessions,
            hasher,
            clock,
            session_ttl,
        }
    }
}

// ============================================================================
// Effects
// ============================================================================

async fn hash_password(hasher: PasswordHasher, password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| NavieraError::Internal(format!("hashing task failed: {e}")))?
}

async fn verify_password(hasher: PasswordHasher, password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .map_err(|e| NavieraError::Internal(format!("verify task failed: {e}")))
}

/// Turn a uniqueness race lost at insert time into the same field error the
/// pre-check would have given.
fn unique_violation(error: StorageError) -> NavieraError {
    let field = [
        (USERNAME_UNIQUE, "username", "A user with that username already exists."),
        (EMAIL_UNIQUE, "email", "A user with that email already exists."),
        (CLIENT_DNI_UNIQUE, "dni", "A client with this document number already exists."),
        (CLIENT_USER_UNIQUE, crate::error::NON_FIELD_ERRORS, "You already have a client profile."),
    ]
    .into_iter()
    .find(|(constraint, _, _)| error.is_conflict_on(constraint));
    match field {
        Some((_, field, message)) => NavieraError::field(field, message),
        None => error.into(),
    }
}

async fn register(env: AccountEnvironment, now: DateTime<Utc>, form: RegistrationForm) -> Result<User> {
    let mut errors = FieldErrors::new();
    if env.accounts.username_taken(&form.username).await? {
        errors.add("username", "A user with that username already exists.");
    }
    if env.accounts.email_taken(form.email.trim(), None).await? {
        errors.add("email", "A user with that email already exists.");
    }
    errors.into_result()?;

    let hash = hash_password(env.hasher, form.password1.clone()).await?;
    let user = User {
        id: UserId::new(),
        username: form.username,
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        country: form.country.trim().to_string(),
        preferred_payment_method: None,
        role_id: None,
        is_staff: false,
        is_active: true,
        date_joined: now,
        last_login: None,
    };
    env.accounts.create_user(&user, &hash).await.map_err(unique_violation)?;
    Ok(user)
}

async fn login(env: AccountEnvironment, now: DateTime<Utc>, attempt: LoginAttempt) -> Result<(User, Session)> {
    let invalid = || NavieraError::Unauthorized(INVALID_LOGIN.to_string());
    let Some((mut user, hash)) = env.accounts.credentials(attempt.identifier.trim()).await? else {
        return Err(invalid());
    };
    if !verify_password(env.hasher, attempt.password, hash).await? || !user.is_active {
        return Err(invalid());
    }
    env.accounts.record_login(user.id, now).await?;
    user.last_login = Some(now);

    let session = Session::new(&user, now, env.session_ttl, attempt.ip, attempt.user_agent);
    env.sessions.create(&session).await?;
    Ok((user, session))
}

async fn change_password(
    env: AccountEnvironment,
    user_id: UserId,
    current_session: SessionId,
    form: PasswordChangeForm,
) -> Result<usize> {
    let user = env
        .accounts
        .user(user_id)
        .await?
        .ok_or_else(|| NavieraError::not_found("User", user_id))?;
    let hash = env
        .accounts
        .password_hash(user_id)
        .await?
        .ok_or_else(|| NavieraError::not_found("User", user_id))?;

    let mut errors = FieldErrors::new();
    if !verify_password(env.hasher, form.old_password.clone(), hash).await? {
        errors.add(
            "old_password",
            "Your old password was entered incorrectly. Please enter it again.",
        );
    }
    check_new_password(
        &mut errors,
        "new_password1",
        "new_password2",
        &form.new_password1,
        &form.new_password2,
        &[
            ("username", &user.username),
            ("first_name", &user.first_name),
            ("last_name", &user.last_name),
            ("email", &user.email),
        ],
    );
    if errors.is_empty() && form.new_password1 == form.old_password {
        errors.add("new_password1", "The new password must be different from the old one.");
    }
    errors.into_result()?;

    let hash = hash_password(env.hasher, form.new_password1).await?;
    env.accounts.set_password(user_id, &hash).await?;
    Ok(env
        .sessions
        .delete_for_user_except(user_id, Some(current_session))
        .await?)
}

async fn update_profile(env: AccountEnvironment, user_id: UserId, form: ProfileForm) -> Result<User> {
    let mut user = env
        .accounts
        .user(user_id)
        .await?
        .ok_or_else(|| NavieraError::not_found("User", user_id))?;
    if env.accounts.email_taken(form.email.trim(), Some(user_id)).await? {
        return Err(NavieraError::field("email", "A user with that email already exists."));
    }
    user.first_name = form.first_name.trim().to_string();
    user.last_name = form.last_name.trim().to_string();
    user.email = form.email.trim().to_string();
    user.phone = form.phone.trim().to_string();
    user.country = form.country.trim().to_string();
    user.preferred_payment_method = form.preferred_payment_method;
    env.accounts.update_user(&user).await.map_err(unique_violation)?;
    Ok(user)
}

async fn create_client(env: AccountEnvironment, user_id: UserId, form: ClientForm) -> Result<Client> {
    if env.accounts.client_for_user(user_id).await?.is_some() {
        return Err(NavieraError::rule("You already have a client profile."));
    }
    let dni = form.dni.trim().to_string();
    if env.accounts.dni_taken(&dni).await? {
        return Err(NavieraError::field("dni", "A client with this document number already exists."));
    }
    let client = Client {
        id: ClientId::new(),
        user_id: Some(user_id),
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        dni,
        nationality: form.nationality.trim().to_string(),
        gender: form.gender,
    };
    env.accounts.create_client(&client).await.map_err(unique_violation)?;
    Ok(client)
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for accounts
#[derive(Clone, Debug)]
pub struct AccountReducer;

impl AccountReducer {
    /// Creates a new `AccountReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for AccountReducer {
    fn default() -> Self {
        Self::new()
    }
}

fn reject(request: Uuid, error: NavieraError) -> Effect<AccountAction> {
    async_effect! { Some(AccountAction::Rejected { request, error }) }
}

fn outcome<T, F>(request: Uuid, result: Result<T>, event: F) -> AccountAction
where
    F: FnOnce(T) -> AccountAction,
{
    match result {
        Ok(value) => event(value),
        Err(error) => AccountAction::Rejected { request, error },
    }
}

impl Reducer for AccountReducer {
    type State = AccountState;
    type Action = AccountAction;
    type Environment = AccountEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let now = env.clock.now();
        match action {
            // ========== Commands ==========
            AccountAction::Register { request, form } => {
                if let Err(fields) = form.validate() {
                    return smallvec![reject(request, fields.into())];
                }
                let env = env.clone();
                smallvec![async_effect! {
                    Some(outcome(request, register(env, now, form).await, |user| {
                        AccountAction::Registered { request, user }
                    }))
                }]
            },

            AccountAction::Login { request, attempt } => {
                let env = env.clone();
                smallvec![async_effect! {
                    Some(outcome(request, login(env, now, attempt).await, |(user, session)| {
                        AccountAction::LoggedIn { request, user, session }
                    }))
                }]
            },

            AccountAction::ChangePassword {
                request,
                user_id,
                current_session,
                form,
            } => {
                let env = env.clone();
                smallvec![async_effect! {
                    Some(outcome(
                        request,
                        change_password(env, user_id, current_session, form).await,
                        |sessions_revoked| AccountAction::PasswordChanged { request, user_id, sessions_revoked },
                    ))
                }]
            },

            AccountAction::UpdateProfile { request, user_id, form } => {
                if let Err(fields) = form.validate() {
                    return smallvec![reject(request, fields.into())];
                }
                let env = env.clone();
                smallvec![async_effect! {
                    Some(outcome(request, update_profile(env, user_id, form).await, |user| {
                        AccountAction::ProfileUpdated { request, user }
                    }))
                }]
            },

            AccountAction::CreateClient { request, user_id, form } => {
                if let Err(fields) = form.validate() {
                    return smallvec![reject(request, fields.into())];
                }
                let env = env.clone();
                smallvec![async_effect! {
                    Some(outcome(request, create_client(env, user_id, form).await, |client| {
                        AccountAction::ClientCreated { request, client }
                    }))
                }]
            },

            // ========== Events ==========
            AccountAction::Registered { user, .. } => {
                state.registered += 1;
                info!(user = %user.id, username = %user.username, "Account registered");
                SmallVec::new()
            },

            AccountAction::LoggedIn { user, .. } => {
                state.logins += 1;
                info!(user = %user.id, "User logged in");
                SmallVec::new()
            },

            AccountAction::PasswordChanged {
                user_id,
                sessions_revoked,
                ..
            } => {
                info!(user = %user_id, sessions_revoked, "Password changed");
                SmallVec::new()
            },

            AccountAction::ProfileUpdated { user, .. } => {
                info!(user = %user.id, "Profile updated");
                SmallVec::new()
            },

            AccountAction::ClientCreated { client, .. } => {
                info!(client = %client.id, "Client profile created");
                SmallVec::new()
            },

            AccountAction::Rejected { request, error } => {
                state.rejected += 1;
                match &error {
                    NavieraError::Unauthorized(_) => warn!(%request, "Login refused"),
                    other => info!(%request, error = %other, "Account command rejected"),
                }
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::session::MemorySessionStore;
    use crate::types::Gender;
    use naviera_testing::{assertions, settle, test_clock, ReducerTest};

    fn env() -> AccountEnvironment {
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        AccountEnvironment::new(
            &Storage::memory(),
            Arc::new(MemorySessionStore::new(clock.clone())),
            PasswordHasher::new(4),
            clock,
            Duration::days(14),
        )
    }

    fn registration(username: &str, email: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Gómez".to_string(),
            email: email.to_string(),
            phone: String::new(),
            country: "Argentina".to_string(),
            password1: "glaciar-austral-77".to_string(),
            password2: "glaciar-austral-77".to_string(),
        }
    }

    async fn run(env: &AccountEnvironment, state: &mut AccountState, action: AccountAction) -> AccountAction {
        let mut actions = settle(&AccountReducer::new(), state, action, env).await;
        actions.pop().unwrap()
    }

    async fn registered(env: &AccountEnvironment, state: &mut AccountState) -> User {
        let outcome = run(
            env,
            state,
            AccountAction::Register { request: Uuid::new_v4(), form: registration("anagomez", "ana@example.com") },
        )
        .await;
        let AccountAction::Registered { user, .. } = outcome else {
            unreachable!("expected registration, got {outcome:?}");
        };
        user
    }

    fn login_as(identifier: &str, password: &str) -> AccountAction {
        AccountAction::Login {
            request: Uuid::new_v4(),
            attempt: LoginAttempt {
                identifier: identifier.to_string(),
                password: password.to_string(),
                ip: Some("127.0.0.1".to_string()),
                user_agent: None,
            },
        }
    }

    #[test]
    fn invalid_form_is_rejected_before_any_io() {
        let mut form = registration("ana", "ana@example.com");
        form.password2 = "something-else-42".to_string();

        ReducerTest::new(AccountReducer::new())
            .with_env(env())
            .given_state(AccountState::default())
            .when_action(AccountAction::Register { request: Uuid::new_v4(), form })
            .then_state(|state| assert_eq!(state.registered, 0))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_field_errors() {
        let env = env();
        let mut state = AccountState::default();
        registered(&env, &mut state).await;

        let outcome = run(
            &env,
            &mut state,
            AccountAction::Register { request: Uuid::new_v4(), form: registration("anagomez", "ANA@example.com") },
        )
        .await;
        let AccountAction::Rejected { error: NavieraError::Validation(fields), .. } = outcome else {
            unreachable!("expected field errors, got {outcome:?}");
        };
        assert!(fields.contains("username"));
        assert!(fields.contains("email"));
    }

    #[tokio::test]
    async fn login_by_username_or_email_opens_session() {
        let env = env();
        let mut state = AccountState::default();
        let user = registered(&env, &mut state).await;

        for identifier in ["anagomez", "Ana@Example.com"] {
            let outcome = run(&env, &mut state, login_as(identifier, "glaciar-austral-77")).await;
            let AccountAction::LoggedIn { session, user: logged, .. } = outcome else {
                unreachable!("expected login, got {outcome:?}");
            };
            assert_eq!(logged.id, user.id);
            assert!(logged.last_login.is_some());
            assert_eq!(env.sessions.get(session.id).await.unwrap().user_id, user.id);
        }
        assert_eq!(state.logins, 2);
    }

    #[tokio::test]
    async fn failed_logins_look_the_same() {
        let env = env();
        let mut state = AccountState::default();
        let user = registered(&env, &mut state).await;

        let wrong_password = run(&env, &mut state, login_as("anagomez", "nope-nope-nope")).await;
        let unknown_user = run(&env, &mut state, login_as("ghost", "glaciar-austral-77")).await;

        let mut inactive = user.clone();
        inactive.is_active = false;
        env.accounts.update_user(&inactive).await.unwrap();
        let disabled = run(&env, &mut state, login_as("anagomez", "glaciar-austral-77")).await;

        for outcome in [wrong_password, unknown_user, disabled] {
            let AccountAction::Rejected { error: NavieraError::Unauthorized(message), .. } = outcome else {
                unreachable!("expected unauthorized, got {outcome:?}");
            };
            assert_eq!(message, INVALID_LOGIN);
        }
    }

    #[tokio::test]
    async fn password_change_keeps_only_current_session() {
        let env = env();
        let mut state = AccountState::default();
        let user = registered(&env, &mut state).await;
        let mut sessions = Vec::new();
        for _ in 0..2 {
            let AccountAction::LoggedIn { session, .. } =
                run(&env, &mut state, login_as("anagomez", "glaciar-austral-77")).await
            else {
                unreachable!("login should succeed");
            };
            sessions.push(session.id);
        }

        let form = |old: &str, new: &str| PasswordChangeForm {
            old_password: old.to_string(),
            new_password1: new.to_string(),
            new_password2: new.to_string(),
        };
        let change = |form| AccountAction::ChangePassword {
            request: Uuid::new_v4(),
            user_id: user.id,
            current_session: sessions[0],
            form,
        };

        let wrong_old = run(&env, &mut state, change(form("bad-old-password", "fiordo-helado-31"))).await;
        assert!(matches!(wrong_old, AccountAction::Rejected { error: NavieraError::Validation(ref f), .. } if f.contains("old_password")));

        let same = run(&env, &mut state, change(form("glaciar-austral-77", "glaciar-austral-77"))).await;
        assert!(matches!(same, AccountAction::Rejected { error: NavieraError::Validation(ref f), .. } if f.contains("new_password1")));

        let changed = run(&env, &mut state, change(form("glaciar-austral-77", "fiordo-helado-31"))).await;
        assert!(matches!(changed, AccountAction::PasswordChanged { sessions_revoked: 1, .. }));
        assert!(env.sessions.get(sessions[0]).await.is_ok());
        assert!(env.sessions.get(sessions[1]).await.is_err());

        let relogin = run(&env, &mut state, login_as("anagomez", "fiordo-helado-31")).await;
        assert!(matches!(relogin, AccountAction::LoggedIn { .. }));
    }

    #[tokio::test]
    async fn one_client_profile_per_account() {
        let env = env();
        let mut state = AccountState::default();
        let user = registered(&env, &mut state).await;
        let client_form = || ClientForm {
            first_name: "Ana".to_string(),
            last_name: "Gómez".to_string(),
            dni: "30999888".to_string(),
            nationality: "Argentina".to_string(),
            gender: Gender::Female,
        };

        let created = run(
            &env,
            &mut state,
            AccountAction::CreateClient { request: Uuid::new_v4(), user_id: user.id, form: client_form() },
        )
        .await;
        assert!(matches!(created, AccountAction::ClientCreated { .. }));

        let again = run(
            &env,
            &mut state,
            AccountAction::CreateClient { request: Uuid::new_v4(), user_id: user.id, form: client_form() },
        )
        .await;
        assert!(matches!(again, AccountAction::Rejected { .. }));
        assert_eq!(env.accounts.list_clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn profile_email_must_stay_unique() {
        let env = env();
        let mut state = AccountState::default();
        let ana = registered(&env, &mut state).await;
        run(
            &env,
            &mut state,
            AccountAction::Register { request: Uuid::new_v4(), form: registration("bruno", "bruno@example.com") },
        )
        .await;

        let form = ProfileForm {
            first_name: "Ana".to_string(),
            last_name: "Gómez".to_string(),
            email: "bruno@example.com".to_string(),
            phone: String::new(),
            country: "Chile".to_string(),
            preferred_payment_method: None,
        };
        let outcome = run(
            &env,
            &mut state,
            AccountAction::UpdateProfile { request: Uuid::new_v4(), user_id: ana.id, form: form.clone() },
        )
        .await;
        assert!(matches!(outcome, AccountAction::Rejected { error: NavieraError::Validation(ref f), .. } if f.contains("email")));

        let keep_own = ProfileForm { email: "ana@example.com".to_string(), ..form };
        let outcome = run(
            &env,
            &mut state,
            AccountAction::UpdateProfile { request: Uuid::new_v4(), user_id: ana.id, form: keep_own },
        )
        .await;
        let AccountAction::ProfileUpdated { user, .. } = outcome else {
            unreachable!("expected update, got {outcome:?}");
        };
        assert_eq!(user.country, "Chile");
    }
}
