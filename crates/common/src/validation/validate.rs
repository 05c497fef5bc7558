//! Garde validation utilities.

use crate::domain::ValidationError;
use garde::{Report, Validate};

/// Run garde rules on a value and collapse the report into a
/// [`ValidationError::MissingField`] naming every offending field.
pub fn validate_struct<T>(value: &T) -> Result<(), ValidationError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| ValidationError::MissingField(format_missing_fields(&report)))
}

/// Field paths from a garde report, joined with ", "
fn format_missing_fields(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            let path = path.to_string();
            if path.is_empty() {
                error.message().to_string()
            } else {
                path
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rejects empty and whitespace-only strings
pub fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[derive(Validate)]
    struct TestRequest {
        #[garde(custom(not_blank))]
        device_id: String,
        #[garde(custom(not_blank))]
        sensor_id: String,
    }

    #[test]
    fn test_validate_success() {
        let request = TestRequest {
            device_id: "dev-1".to_string(),
            sensor_id: "s-1".to_string(),
        };
        assert!(validate_struct(&request).is_ok());
    }

    #[test]
    fn test_whitespace_is_blank() {
        let request = TestRequest {
            device_id: "   ".to_string(),
            sensor_id: "s-1".to_string(),
        };
        let result = validate_struct(&request);
        assert_eq!(
            result,
            Err(ValidationError::MissingField("device_id".to_string()))
        );
    }

    #[test]
    fn test_every_blank_field_is_named() {
        let request = TestRequest {
            device_id: "".to_string(),
            sensor_id: "".to_string(),
        };
        match validate_struct(&request) {
            Err(ValidationError::MissingField(fields)) => {
                assert!(fields.contains("device_id"));
                assert!(fields.contains("sensor_id"));
            }
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }
}
