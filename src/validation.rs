//! Field-scoped validators shared by request types and services.
//!
//! Each validator checks one field and reports a `validator::ValidationError`
//! carrying a client-facing message, so `#[validate(custom = "...")]` can use them
//! directly and the results flatten into [`FieldErrors`].

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use validator::{Validate, ValidationError};

use crate::errors::FieldErrors;

/// Rating value that is never accepted, whatever the range.
pub const DISALLOWED_RATING: Decimal = dec!(3.3);
pub const MIN_RATING: Decimal = dec!(1);
pub const MAX_RATING: Decimal = dec!(5);

pub const PRICE_MAX_DIGITS: u32 = 10;
pub const PRICE_DECIMAL_PLACES: u32 = 2;
pub const RATING_MAX_DIGITS: u32 = 2;
pub const RATING_DECIMAL_PLACES: u32 = 1;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const BLANK_MESSAGE: &str = "This field may not be blank.";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "The passwords do not match";

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{7,15}$").expect("valid phone regex");
}

fn error(code: &'static str, message: impl Into<String>) -> ValidationError {
    let message: String = message.into();
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Enforces a decimal column of `max_digits` total digits with `decimal_places`
/// fractional digits.
fn check_decimal_shape(
    value: &Decimal,
    max_digits: u32,
    decimal_places: u32,
) -> Result<(), ValidationError> {
    let normalized = value.normalize();
    let scale = normalized.scale();
    let digits = normalized.mantissa().unsigned_abs().to_string().len() as u32;
    let total_digits = digits.max(scale);
    let whole_digits = digits.saturating_sub(scale);

    if total_digits > max_digits {
        return Err(error(
            "max_digits",
            format!(
                "Ensure that there are no more than {} digits in total.",
                max_digits
            ),
        ));
    }
    if scale > decimal_places {
        let unit = if decimal_places == 1 { "place" } else { "places" };
        return Err(error(
            "decimal_places",
            format!(
                "Ensure that there are no more than {} decimal {}.",
                decimal_places, unit
            ),
        ));
    }
    if whole_digits > max_digits - decimal_places {
        return Err(error(
            "max_whole_digits",
            format!(
                "Ensure that there are no more than {} digits before the decimal point.",
                max_digits - decimal_places
            ),
        ));
    }
    Ok(())
}

/// Price must be non-negative and fit `DECIMAL(10, 2)`.
pub fn validate_price(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(error("price_negative", "Price cannot be negative."));
    }
    check_decimal_shape(value, PRICE_MAX_DIGITS, PRICE_DECIMAL_PLACES)
}

/// Rating must lie in `[1, 5]` with one decimal place and must not be 3.3.
pub fn validate_rating(value: &Decimal) -> Result<(), ValidationError> {
    if *value < MIN_RATING {
        return Err(error(
            "rating_min",
            format!("Ensure this value is greater than or equal to {}.", MIN_RATING),
        ));
    }
    if *value > MAX_RATING {
        return Err(error(
            "rating_max",
            format!("Ensure this value is less than or equal to {}.", MAX_RATING),
        ));
    }
    if *value == DISALLOWED_RATING {
        return Err(error("rating_disallowed", "This rating value is not allowed."));
    }
    check_decimal_shape(value, RATING_MAX_DIGITS, RATING_DECIMAL_PLACES)
}

/// 7 to 15 digits with an optional leading `+`.
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let compact: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if PHONE_RE.is_match(&compact) {
        Ok(())
    } else {
        Err(error("phone", "Enter a valid phone number."))
    }
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("blank", BLANK_MESSAGE))
    } else {
        Ok(())
    }
}

/// Phone numbers are stored without separators.
pub fn normalize_phone(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}

/// Confirmation check for registration; the failure is reported on `password2`.
pub fn check_password_pair(password1: &str, password2: &str, errors: &mut FieldErrors) {
    if password1 != password2 {
        errors.add("password2", PASSWORD_MISMATCH_MESSAGE);
    }
}

/// Derive-level field errors of `value`, empty when it is valid.
pub fn collect_errors<T: Validate>(value: &T) -> FieldErrors {
    match value.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => FieldErrors::from(&errors),
    }
}

/// Unwraps a mandatory field, recording "required" when it is missing.
pub fn require<T>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, REQUIRED_MESSAGE);
    }
    value
}

/// Runs a field validator and records its message under `field`.
pub fn check_field<T: ?Sized>(
    errors: &mut FieldErrors,
    field: &str,
    value: &T,
    validator: fn(&T) -> Result<(), ValidationError>,
) {
    if let Err(err) = validator(value) {
        let message = err
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("Invalid value ({}).", err.code));
        errors.add(field, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(0.01))]
    #[case(dec!(19.99))]
    #[case(dec!(99999999.99))]
    fn accepts_valid_prices(#[case] price: Decimal) {
        assert!(validate_price(&price).is_ok());
    }

    #[rstest]
    #[case(dec!(-5), "Price cannot be negative.")]
    #[case(dec!(-0.01), "Price cannot be negative.")]
    #[case(dec!(1.999), "Ensure that there are no more than 2 decimal places.")]
    #[case(dec!(12345678901), "Ensure that there are no more than 10 digits in total.")]
    #[case(
        dec!(123456789.5),
        "Ensure that there are no more than 8 digits before the decimal point."
    )]
    fn rejects_invalid_prices(#[case] price: Decimal, #[case] message: &str) {
        let err = validate_price(&price).unwrap_err();
        assert_eq!(err.message.unwrap(), message);
    }

    #[test]
    fn trailing_zeros_do_not_count_as_decimal_places() {
        assert!(validate_price(&dec!(10.500)).is_ok());
        assert!(validate_rating(&dec!(4.50)).is_ok());
    }

    #[rstest]
    #[case(dec!(1))]
    #[case(dec!(1.0))]
    #[case(dec!(3.2))]
    #[case(dec!(3.4))]
    #[case(dec!(5))]
    fn accepts_valid_ratings(#[case] rating: Decimal) {
        assert!(validate_rating(&rating).is_ok());
    }

    #[rstest]
    #[case(dec!(0.9))]
    #[case(dec!(5.1))]
    #[case(dec!(3.3))]
    #[case(dec!(3.30))]
    #[case(dec!(4.25))]
    fn rejects_invalid_ratings(#[case] rating: Decimal) {
        assert!(validate_rating(&rating).is_err());
    }

    #[rstest]
    #[case("+996555123456", true)]
    #[case("0555 12-34-56", true)]
    #[case("12345", false)]
    #[case("phone", false)]
    fn phone_numbers(#[case] phone: &str, #[case] ok: bool) {
        assert_eq!(validate_phone(phone).is_ok(), ok);
    }

    #[test]
    fn password_mismatch_is_reported_on_confirmation() {
        let mut errors = FieldErrors::new();
        check_password_pair("s3cret-pass", "s3cret-pasS", &mut errors);
        assert_eq!(errors.get("password2").unwrap(), [PASSWORD_MISMATCH_MESSAGE]);
        assert!(!errors.contains("password1"));

        let mut errors = FieldErrors::new();
        check_password_pair("same", "same", &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn require_and_check_field_aggregate() {
        let mut errors = FieldErrors::new();
        assert!(require::<String>(&mut errors, "name", None).is_none());
        check_field(&mut errors, "price", &dec!(-1), validate_price);
        check_field(&mut errors, "rating", &dec!(3.3), validate_rating);

        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["name", "price", "rating"]
        );
    }
}
