use chrono::{DateTime, Utc};
use common::domain::{TelemetryReading, ValidationError};
use common::validation::validate_struct;

/// Check a reading before it is stored or published.
///
/// Order of checks: blank identity fields, value shape against the sensor
/// type, then timestamp against `now`. The first failure wins.
pub fn validate(reading: &TelemetryReading, now: DateTime<Utc>) -> Result<(), ValidationError> {
    validate_struct(reading)?;

    let expected = reading.sensor_type.required_kind();
    let actual = reading.value.kind();
    if expected != actual {
        return Err(ValidationError::VariantMismatch {
            sensor_type: reading.sensor_type,
            expected,
            actual,
        });
    }

    if reading.timestamp > now {
        return Err(ValidationError::FutureTimestamp {
            timestamp: reading.timestamp,
        });
    }

    Ok(())
}
