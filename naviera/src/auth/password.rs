//! Password hashing and strength rules.

use strsim::normalized_levenshtein;

use crate::error::{NavieraError, Result};

/// Shortest accepted password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Similarity at which a password counts as derived from a user attribute.
pub const MAX_SIMILARITY: f64 = 0.7;

/// Passwords refused outright (compared case-insensitively).
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "password", "12345678", "qwerty", "123456789", "12345", "1234", "111111",
    "1234567", "dragon", "123123", "baseball", "abc123", "football", "monkey", "letmein",
    "696969", "shadow", "master", "666666", "qwertyuiop", "123321", "mustang", "1234567890",
    "michael", "654321", "superman", "1qaz2wsx", "7777777", "121212", "000000", "qazwsx",
    "123qwe", "killer", "trustno1", "jordan", "jennifer", "zxcvbnm", "asdfgh", "hunter",
    "buster", "soccer", "harley", "batman", "andrew", "tigger", "sunshine", "iloveyou",
    "2000", "charlie", "robert", "thomas", "hockey", "ranger", "daniel", "starwars",
    "klaster", "112233", "george", "computer", "michelle", "jessica", "pepper", "1111",
    "zxcvbn", "555555", "11111111", "131313", "freedom", "777777", "pass", "maggie",
    "159753", "aaaaaa", "ginger", "princess", "joshua", "cheese", "amanda", "summer",
    "love", "ashley", "nicole", "chelsea", "biteme", "matthew", "access", "yankees",
    "987654321", "dallas", "austin", "thunder", "taylor", "matrix", "password1",
    "password123", "welcome", "welcome1", "admin", "admin123", "qwerty123", "passw0rd",
    "contraseña", "contrasena", "iloveyou1", "abcd1234", "qwer1234", "q1w2e3r4",
    "1q2w3e4r", "secret", "changeme", "whatever", "football1", "baseball1", "letmein1",
];

/// bcrypt with a configurable cost.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    /// Hasher with the given bcrypt cost (4..=31).
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password. CPU-bound: call from `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// [`NavieraError::Internal`] for an invalid cost.
    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost).map_err(|e| NavieraError::Internal(format!("hashing failed: {e}")))
    }

    /// Check a password against a stored hash. Malformed hashes never match.
    #[must_use]
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

/// A user attribute a password must not resemble, e.g. `("username", "ana")`.
pub type Attribute<'a> = (&'a str, &'a str);

fn too_similar(password: &str, value: &str) -> bool {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return false;
    }
    let parts = value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .chain(std::iter::once(value.as_str()));
    for part in parts {
        if normalized_levenshtein(password, part) >= MAX_SIMILARITY {
            return true;
        }
        if part.chars().count() >= 3 && password.contains(part) {
            return true;
        }
    }
    false
}

/// Run every password rule. Returns one message per failed rule.
#[must_use]
pub fn password_problems(password: &str, attributes: &[Attribute<'_>]) -> Vec<String> {
    let mut problems = Vec::new();
    let lowered = password.to_lowercase();

    if let Some((name, _)) = attributes
        .iter()
        .find(|(_, value)| too_similar(&lowered, value))
    {
        problems.push(format!("The password is too similar to the {}.", name.replace('_', " ")));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.trim()) {
        problems.push("This password is too common.".to_string());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    problems
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ANA: &[Attribute<'static>] = &[
        ("username", "anagomez"),
        ("first_name", "Ana"),
        ("last_name", "Gómez"),
        ("email", "ana.gomez@example.com"),
    ];

    #[test]
    fn test_strong_password_passes() {
        assert!(password_problems("Tr4vesía-del-Sur", ANA).is_empty());
    }

    #[test]
    fn test_short_numeric_password_reports_each_rule() {
        let problems = password_problems("1234", ANA);
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("too short")));
        assert!(problems.iter().any(|p| p.contains("too common")));
        assert!(problems.iter().any(|p| p.contains("entirely numeric")));
    }

    #[test]
    fn test_password_resembling_username_is_rejected() {
        let problems = password_problems("anagomez1", ANA);
        assert_eq!(problems, vec!["The password is too similar to the username.".to_string()]);
    }

    #[test]
    fn test_password_containing_email_part_is_rejected() {
        let problems = password_problems("xXgomezXx2025", ANA);
        assert!(problems[0].contains("too similar"));
    }

    #[test]
    fn test_common_password_is_case_insensitive() {
        assert!(password_problems("PASSWORD123", &[]).iter().any(|p| p.contains("too common")));
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(bcrypt::DEFAULT_COST.min(4));
        let hash = hasher.hash("Tr4vesía-del-Sur").unwrap();

        assert!(hasher.verify("Tr4vesía-del-Sur", &hash));
        assert!(!hasher.verify("wrong", &hash));
        assert!(!hasher.verify("Tr4vesía-del-Sur", "not-a-hash"));
    }
}
