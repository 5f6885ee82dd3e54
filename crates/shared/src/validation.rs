//! Common validation utilities.

use validator::ValidationError;

/// Minimum number of digits in a contact phone number.
const MIN_PHONE_DIGITS: usize = 5;

/// Maximum number of digits in a contact phone number (E.164 allows 15).
const MAX_PHONE_DIGITS: usize = 15;

/// Validates a free-form contact phone number.
///
/// Accepts digits plus the usual separators (`+`, space, `-`, `(`, `)`, `.`)
/// and requires between 5 and 15 digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'));
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();

    if allowed && (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone must contain 5 to 15 digits".into());
        Err(err)
    }
}

/// Validates the `options` payload of a choice question: a JSON array of
/// non-empty strings.
pub fn validate_question_options(options: &str) -> Result<(), ValidationError> {
    match serde_json::from_str::<Vec<String>>(options) {
        Ok(values) if !values.is_empty() && values.iter().all(|v| !v.trim().is_empty()) => Ok(()),
        _ => {
            let mut err = ValidationError::new("options_format");
            err.message = Some("Options must be a JSON array of non-empty strings".into());
            Err(err)
        }
    }
}

/// Validates a guest count: the registering user plus their guests.
pub fn validate_guest_count(guest_count: i32) -> Result<(), ValidationError> {
    if guest_count >= 1 {
        Ok(())
    } else {
        let mut err = ValidationError::new("guest_count_range");
        err.message = Some("guest_count must be at least 1".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::phone_number::en::PhoneNumber;
    use fake::Fake;

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+1 (555) 123-4567").is_ok());
        assert!(validate_phone("12345").is_ok());
        assert!(validate_phone("1234").is_err());
        assert!(validate_phone("1234567890123456").is_err());
        assert!(validate_phone("call me").is_err());
    }

    #[test]
    fn test_validate_phone_generated_numbers() {
        for _ in 0..20 {
            let phone: String = PhoneNumber().fake();
            let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
            let allowed = phone
                .chars()
                .all(|c| c.is_ascii_digit() || "+ -().".contains(c));
            assert_eq!(
                validate_phone(&phone).is_ok(),
                allowed && (5..=15).contains(&digits),
                "{}",
                phone
            );
        }
    }

    #[test]
    fn test_validate_phone_error_message() {
        let err = validate_phone("12").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Phone must contain 5 to 15 digits"
        );
    }

    #[test]
    fn test_validate_question_options() {
        assert!(validate_question_options(r#"["Vegan","Vegetarian"]"#).is_ok());
        assert!(validate_question_options("[]").is_err());
        assert!(validate_question_options(r#"["", "x"]"#).is_err());
        assert!(validate_question_options(r#"{"a":1}"#).is_err());
        assert!(validate_question_options("not json").is_err());
    }

    #[test]
    fn test_validate_guest_count() {
        assert!(validate_guest_count(1).is_ok());
        assert!(validate_guest_count(12).is_ok());
        assert!(validate_guest_count(0).is_err());
        assert!(validate_guest_count(-3).is_err());
    }
}
