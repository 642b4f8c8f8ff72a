//! Account forms and their field rules.
//!
//! These checks need no storage. Uniqueness and password verification happen
//! in the account reducer's effects.

use naviera_web::FieldErrors;
use serde::{Deserialize, Serialize};

use super::password::{password_problems, Attribute};
use crate::types::{Gender, PaymentMethod};

/// Longest username.
pub const USERNAME_MAX: usize = 150;
const NAME_MAX: usize = 50;
const PHONE_MAX: usize = 20;
const COUNTRY_MAX: usize = 50;
const DNI_MAX: usize = 20;

/// Sign-up form.
#[derive(Clone, Debug, Deserialize)]
pub struct RegistrationForm {
    /// Login name
    pub username: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email
    pub email: String,
    /// Phone
    #[serde(default)]
    pub phone: String,
    /// Country
    #[serde(default)]
    pub country: String,
    /// Password
    pub password1: String,
    /// Password again
    pub password2: String,
}

/// Login form. `username` may also be an email address.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginForm {
    /// Username or email
    pub username: String,
    /// Password
    pub password: String,
}

/// Profile edit form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileForm {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email
    pub email: String,
    /// Phone
    #[serde(default)]
    pub phone: String,
    /// Country
    #[serde(default)]
    pub country: String,
    /// Method offered first at checkout
    #[serde(default)]
    pub preferred_payment_method: Option<PaymentMethod>,
}

/// Password change form.
#[derive(Clone, Debug, Deserialize)]
pub struct PasswordChangeForm {
    /// Current password
    pub old_password: String,
    /// New password
    pub new_password1: String,
    /// New password again
    pub new_password2: String,
}

/// Client profile form.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientForm {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Identity document
    pub dni: String,
    /// Nationality
    pub nationality: String,
    /// Gender
    pub gender: Gender,
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

fn check_contact(errors: &mut FieldErrors, first_name: &str, last_name: &str, email: &str, phone: &str, country: &str) {
    errors.check_text("first_name", first_name, NAME_MAX);
    errors.check_text("last_name", last_name, NAME_MAX);
    if errors.check_email("email", email) {
        errors.check_max_len("email", email, 254);
    }
    errors.check_max_len("phone", phone, PHONE_MAX);
    errors.check_max_len("country", country, COUNTRY_MAX);
}

/// Check a new password pair, reporting under `second_field`.
pub fn check_new_password(
    errors: &mut FieldErrors,
    first_field: &str,
    second_field: &str,
    first: &str,
    second: &str,
    attributes: &[Attribute<'_>],
) {
    let first_ok = errors.check_required(first_field, first);
    let second_ok = errors.check_required(second_field, second);
    if !(first_ok && second_ok) {
        return;
    }
    if first != second {
        errors.add(second_field, "The two password fields didn't match.");
        return;
    }
    for problem in password_problems(second, attributes) {
        errors.add(second_field, problem);
    }
}

impl RegistrationForm {
    /// Field rules, including password strength.
    ///
    /// # Errors
    ///
    /// Every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if errors.check_text("username", &self.username, USERNAME_MAX)
            && !self.username.chars().all(is_username_char)
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        check_contact(&mut errors, &self.first_name, &self.last_name, &self.email, &self.phone, &self.country);
        check_new_password(
            &mut errors,
            "password1",
            "password2",
            &self.password1,
            &self.password2,
            &[
                ("username", &self.username),
                ("first_name", &self.first_name),
                ("last_name", &self.last_name),
                ("email", &self.email),
            ],
        );
        errors.into_result()
    }
}

impl ProfileForm {
    /// Field rules.
    ///
    /// # Errors
    ///
    /// Every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_contact(&mut errors, &self.first_name, &self.last_name, &self.email, &self.phone, &self.country);
        errors.into_result()
    }
}

impl ClientForm {
    /// Field rules.
    ///
    /// # Errors
    ///
    /// Every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check_text("first_name", &self.first_name, NAME_MAX);
        errors.check_text("last_name", &self.last_name, NAME_MAX);
        errors.check_text("dni", &self.dni, DNI_MAX);
        errors.check_text("nationality", &self.nationality, NAME_MAX);
        errors.into_result()
    }
}
