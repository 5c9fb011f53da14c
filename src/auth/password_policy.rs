/*!
 * # Password Policy Module
 *
 * Strength rules applied to new passwords at registration and password change.
 * Every failing rule is reported, not just the first one.
 */

use lazy_static::lazy_static;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("This password is too short. It must contain at least {min_length} characters.")]
    TooShort { min_length: usize },

    #[error("This password is too long. It must contain at most {max_length} characters.")]
    TooLong { max_length: usize },

    #[error("This password is too common.")]
    CommonPassword,

    #[error("This password is entirely numeric.")]
    EntirelyNumeric,

    #[error("The password is too similar to the {attribute}.")]
    SimilarToAttribute { attribute: &'static str },
}

/// Account attributes a password must not resemble.
#[derive(Debug, Clone, Default)]
pub struct UserAttributes<'a> {
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

impl<'a> UserAttributes<'a> {
    fn named(&self) -> [(&'static str, Option<&'a str>); 4] {
        [
            ("email", self.email.map(email_local_part)),
            ("phone", self.phone),
            ("first name", self.first_name),
            ("last name", self.last_name),
        ]
    }
}

fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Pluggable strength check so deployments and tests can swap the rules.
pub trait PasswordStrength: Send + Sync {
    fn validate(
        &self,
        password: &str,
        attributes: &UserAttributes<'_>,
    ) -> Result<(), Vec<PasswordPolicyError>>;
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub prevent_common_passwords: bool,
    pub prevent_numeric: bool,
    pub prevent_similarity: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            prevent_common_passwords: true,
            prevent_numeric: true,
            prevent_similarity: true,
        }
    }
}

lazy_static! {
    static ref COMMON_PASSWORDS: HashSet<&'static str> = [
        "password", "123456", "123456789", "qwerty", "abc123", "password123",
        "admin", "letmein", "welcome", "monkey", "1234567890", "iloveyou",
        "princess", "rockyou", "1234567", "12345678", "password1", "123123",
        "football", "baseball", "welcome1", "jordan23", "superman", "michael",
        "whatever", "trustno1", "qwerty123", "test1234", "qazwsx", "1qaz2wsx",
        "q1w2e3r4", "asdfghjkl", "zxcvbnm", "asdf1234", "11111111", "00000000",
        "qwertyuiop", "sunshine", "dragon", "passw0rd", "master", "starwars",
    ]
    .into_iter()
    .collect();
}

impl PasswordPolicy {
    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            min_length,
            ..Self::default()
        }
    }

    /// Similar when the password contains the attribute (or its parts) or the
    /// other way round.
    fn is_similar(password: &str, attribute: &str) -> bool {
        let password = password.to_lowercase();
        let attribute = attribute.to_lowercase();
        if attribute.len() < 3 {
            return false;
        }
        if password.contains(&attribute) || (password.len() >= 3 && attribute.contains(&password))
        {
            return true;
        }
        attribute
            .split(|c: char| !c.is_alphanumeric())
            .filter(|part| part.len() >= 3)
            .any(|part| password.contains(part))
    }
}

impl PasswordStrength for PasswordPolicy {
    fn validate(
        &self,
        password: &str,
        attributes: &UserAttributes<'_>,
    ) -> Result<(), Vec<PasswordPolicyError>> {
        let mut errors = Vec::new();
        let length = password.chars().count();

        if self.prevent_similarity {
            if let Some((attribute, _)) = attributes
                .named()
                .into_iter()
                .find(|(_, value)| value.map_or(false, |v| Self::is_similar(password, v)))
            {
                errors.push(PasswordPolicyError::SimilarToAttribute { attribute });
            }
        }

        if length < self.min_length {
            errors.push(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }
        if length > self.max_length {
            errors.push(PasswordPolicyError::TooLong {
                max_length: self.max_length,
            });
        }

        if self.prevent_common_passwords
            && COMMON_PASSWORDS.contains(password.to_lowercase().trim())
        {
            errors.push(PasswordPolicyError::CommonPassword);
        }

        if self.prevent_numeric && !password.is_empty() && password.chars().all(|c| c.is_ascii_digit())
        {
            errors.push(PasswordPolicyError::EntirelyNumeric);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn no_attributes() -> UserAttributes<'static> {
        UserAttributes::default()
    }

    #[test]
    fn accepts_reasonable_password() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("velvet-harbor-42", &no_attributes()).is_ok());
    }

    #[test]
    fn short_numeric_common_password_reports_every_rule() {
        let policy = PasswordPolicy::default();
        let errors = policy.validate("123456", &no_attributes()).unwrap_err();

        assert!(errors.contains(&PasswordPolicyError::TooShort { min_length: 8 }));
        assert!(errors.contains(&PasswordPolicyError::CommonPassword));
        assert!(errors.contains(&PasswordPolicyError::EntirelyNumeric));
    }

    #[test]
    fn rejects_password_resembling_email() {
        let policy = PasswordPolicy::default();
        let attributes = UserAttributes {
            email: Some("marigold@example.com"),
            ..UserAttributes::default()
        };
        let errors = policy.validate("marigold2024", &attributes).unwrap_err();
        assert_matches!(
            errors.as_slice(),
            [PasswordPolicyError::SimilarToAttribute { attribute: "email" }]
        );
    }

    #[test]
    fn configured_minimum_length_is_used() {
        let policy = PasswordPolicy::with_min_length(12);
        let errors = policy.validate("tulip-orbit", &no_attributes()).unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "This password is too short. It must contain at least 12 characters."
        );
    }
}
