use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest},
        jwt::{fingerprint, JwtKeys, TokenPair},
        password::PasswordHasher,
        repo::{UserRepo, EMAIL_TAKEN},
        repo_types::{NewUser, User},
    },
    error::{AppError, AppResult},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn parse_dob(raw: &str) -> AppResult<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::Validation("Invalid DOB format, expected YYYY-MM-DD".into()))
}

/// Whole years between `dob` and `today`, minus one if the birthday hasn't
/// come round yet this year.
pub fn age_on(dob: Date, today: Date) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month() as u8, today.day()) < (dob.month() as u8, dob.day()) {
        age -= 1;
    }
    age
}

/// Signup, login and refresh flows over the credential store.
pub struct AuthService<'a> {
    pub users: &'a dyn UserRepo,
    pub keys: &'a JwtKeys,
    pub hasher: &'a PasswordHasher,
}

impl<'a> AuthService<'a> {
    pub async fn signup(&self, req: SignupRequest, today: Date) -> AppResult<AuthResponse> {
        let email = normalize_email(&req.email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation("Invalid email".into()));
        }
        if req.password.is_empty() {
            return Err(AppError::Validation("Password is required".into()));
        }
        let display_name = req.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AppError::Validation("Display name is required".into()));
        }
        let dob = parse_dob(&req.dob)?;
        if dob > today {
            return Err(AppError::Validation("Date of birth is in the future".into()));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict(EMAIL_TAKEN.into()));
        }

        let password_hash = self.hasher.hash(&req.password)?;
        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                display_name,
                dob,
            })
            .await?;

        info!(user_id = %user.id, "user registered");
        self.start_session(&user, today).await
    }

    /// Unknown email and wrong password produce the same error.
    pub async fn login(&self, req: LoginRequest, today: Date) -> AppResult<AuthResponse> {
        let email = normalize_email(&req.email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.hasher.verify_decoy(&req.password);
            warn!("login unknown email");
            return Err(AppError::InvalidCredentials);
        };
        if !self.hasher.verify(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        info!(user_id = %user.id, "user logged in");
        self.start_session(&user, today).await
    }

    /// Only the most recently issued refresh token is accepted; using it
    /// replaces it.
    pub async fn refresh(&self, refresh_token: &str, today: Date) -> AppResult<AuthResponse> {
        let claims = self.keys.verify_refresh(refresh_token)?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;
        if user.refresh_token_hash.as_deref() != Some(fingerprint(refresh_token).as_str()) {
            warn!(user_id = %user.id, "refresh token is not the latest issued");
            return Err(AppError::InvalidToken);
        }

        info!(user_id = %user.id, "session refreshed");
        self.start_session(&user, today).await
    }

    pub async fn current_user(&self, user_id: Uuid, today: Date) -> AppResult<PublicUser> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;
        Ok(public_user(&user, today))
    }

    async fn start_session(&self, user: &User, today: Date) -> AppResult<AuthResponse> {
        let TokenPair { access, refresh } = self.keys.issue_pair(user.id, &user.email)?;
        self.users
            .set_refresh_token_hash(user.id, Some(&fingerprint(&refresh.token)))
            .await?;

        Ok(AuthResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.keys.access_ttl.whole_seconds(),
            token_type: "bearer",
            expires_at: access.expires_at,
            user: public_user(user, today),
        })
    }
}

fn public_user(user: &User, today: Date) -> PublicUser {
    PublicUser {
        id: user.id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        age: age_on(user.dob, today),
        created_at: user.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_hasher, test_keys, MemoryUserRepo};
    use time::macros::date;

    const TODAY: Date = date!(2024 - 06 - 01);

    fn signup_req(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            password: password.into(),
            display_name: "Ada".into(),
            dob: "1990-07-15".into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    struct Fixture {
        users: MemoryUserRepo,
        keys: JwtKeys,
        hasher: PasswordHasher,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                users: MemoryUserRepo::default(),
                keys: test_keys(),
                hasher: test_hasher(),
            }
        }

        fn service(&self) -> AuthService<'_> {
            AuthService {
                users: &self.users,
                keys: &self.keys,
                hasher: &self.hasher,
            }
        }
    }

    #[test]
    fn age_counts_birthday_only_once_reached() {
        let dob = date!(2000 - 03 - 15);
        assert_eq!(age_on(dob, date!(2024 - 03 - 14)), 23);
        assert_eq!(age_on(dob, date!(2024 - 03 - 15)), 24);
        assert_eq!(age_on(dob, date!(2024 - 03 - 16)), 24);
        assert_eq!(age_on(dob, date!(2024 - 02 - 20)), 23);
        assert_eq!(age_on(dob, date!(2000 - 03 - 15)), 0);
    }

    #[test]
    fn leap_day_birthdays() {
        let dob = date!(2004 - 02 - 29);
        assert_eq!(age_on(dob, date!(2023 - 02 - 28)), 18);
        assert_eq!(age_on(dob, date!(2023 - 03 - 01)), 19);
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("no-at.example.com"));
        assert!(!is_valid_email("two words@b.io"));
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn dob_must_be_a_calendar_date() {
        assert_eq!(parse_dob("2000-03-15").unwrap(), date!(2000 - 03 - 15));
        assert!(parse_dob("2001-02-29").is_err());
        assert!(parse_dob("15/03/2000").is_err());
        assert!(parse_dob("2000-3-15").is_err());
    }

    #[tokio::test]
    async fn signup_then_login_succeeds() {
        let fx = Fixture::new();
        let session = fx
            .service()
            .signup(signup_req("Ada@Example.com", "pw"), TODAY)
            .await
            .expect("signup");
        assert_eq!(session.user.email, "ada@example.com");
        assert_eq!(session.user.display_name, "Ada");
        assert_eq!(session.user.age, 33);
        assert_eq!(session.token_type, "bearer");
        assert_eq!(session.expires_in, 30 * 60);

        let claims = fx.keys.verify_access(&session.access_token).expect("access token");
        assert_eq!(claims.sub, session.user.id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.exp, session.expires_at);

        let login = fx
            .service()
            .login(login_req("ada@example.com", "pw"), TODAY)
            .await
            .expect("login");
        assert_eq!(login.user.id, session.user.id);
    }

    #[tokio::test]
    async fn signup_response_never_contains_the_hash() {
        let fx = Fixture::new();
        let session = fx.service().signup(signup_req("a@b.io", "pw"), TODAY).await.unwrap();
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_without_new_row() {
        let fx = Fixture::new();
        fx.service().signup(signup_req("a@b.io", "pw"), TODAY).await.unwrap();
        let err = fx
            .service()
            .signup(signup_req(" A@B.io", "other"), TODAY)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(fx.users.user_count(), 1);
    }

    #[tokio::test]
    async fn signup_validation() {
        let fx = Fixture::new();
        let svc = fx.service();

        let err = svc.signup(signup_req("nope", "pw"), TODAY).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = svc.signup(signup_req("a@b.io", ""), TODAY).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut bad_dob = signup_req("a@b.io", "pw");
        bad_dob.dob = "1990-13-01".into();
        assert!(matches!(svc.signup(bad_dob, TODAY).await, Err(AppError::Validation(_))));

        let mut future = signup_req("a@b.io", "pw");
        future.dob = "2030-01-01".into();
        assert!(matches!(svc.signup(future, TODAY).await, Err(AppError::Validation(_))));

        let mut nameless = signup_req("a@b.io", "pw");
        nameless.display_name = "   ".into();
        assert!(matches!(svc.signup(nameless, TODAY).await, Err(AppError::Validation(_))));

        assert_eq!(fx.users.user_count(), 0);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let fx = Fixture::new();
        fx.service().signup(signup_req("a@b.io", "right"), TODAY).await.unwrap();

        let wrong_password = fx
            .service()
            .login(login_req("a@b.io", "wrong"), TODAY)
            .await
            .unwrap_err();
        let unknown_email = fx
            .service()
            .login(login_req("ghost@b.io", "right"), TODAY)
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.status(), unknown_email.status());
    }

    #[tokio::test]
    async fn refresh_rotates_and_retires_old_token() {
        let fx = Fixture::new();
        let first = fx.service().signup(signup_req("a@b.io", "pw"), TODAY).await.unwrap();

        let second = fx
            .service()
            .refresh(&first.refresh_token, TODAY)
            .await
            .expect("refresh");
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(second.user.id, first.user.id);
        fx.keys.verify_access(&second.access_token).expect("new access token");

        let reused = fx.service().refresh(&first.refresh_token, TODAY).await.unwrap_err();
        assert!(matches!(reused, AppError::InvalidToken));

        fx.service()
            .refresh(&second.refresh_token, TODAY)
            .await
            .expect("latest token still works");
    }

    #[tokio::test]
    async fn login_retires_previous_refresh_token() {
        let fx = Fixture::new();
        let first = fx.service().signup(signup_req("a@b.io", "pw"), TODAY).await.unwrap();
        fx.service().login(login_req("a@b.io", "pw"), TODAY).await.unwrap();
        let err = fx.service().refresh(&first.refresh_token, TODAY).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens_and_garbage() {
        let fx = Fixture::new();
        let session = fx.service().signup(signup_req("a@b.io", "pw"), TODAY).await.unwrap();
        assert!(matches!(
            fx.service().refresh(&session.access_token, TODAY).await,
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            fx.service().refresh("garbage", TODAY).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn current_user_reports_profile() {
        let fx = Fixture::new();
        let session = fx.service().signup(signup_req("a@b.io", "pw"), TODAY).await.unwrap();
        let me = fx.service().current_user(session.user.id, TODAY).await.unwrap();
        assert_eq!(me.email, "a@b.io");
        assert_eq!(me.age, 33);
        assert!(matches!(
            fx.service().current_user(Uuid::new_v4(), TODAY).await,
            Err(AppError::NotFound(_))
        ));
    }
}
