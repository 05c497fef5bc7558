use crate::domain::ValueKind;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Payload of a single sensor reading.
///
/// On the wire the variant is selected by an `@type` discriminator that sits
/// next to the variant's own fields, e.g. `{"@type":"scalar","value":65.5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "lowercase")]
pub enum SensorValue {
    Scalar(ScalarValue),
    Vibration(VibrationValue),
    Power(PowerValue),
    Boolean(BooleanValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarValue {
    pub value: f64,
}

/// Three-axis acceleration sample in g
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VibrationValue {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl VibrationValue {
    /// sqrt(x² + y² + z²)
    pub fn rms(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Identical to [`VibrationValue::rms`] for a single sample.
    pub fn magnitude(&self) -> f64 {
        self.rms()
    }
}

/// Power-quality tuple: volts, amps, real watts and a power factor in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "PowerValueFields")]
pub struct PowerValue {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub power_factor: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PowerValueFields {
    voltage: f64,
    current: f64,
    power: f64,
    power_factor: f64,
}

impl TryFrom<PowerValueFields> for PowerValue {
    type Error = String;

    fn try_from(fields: PowerValueFields) -> Result<Self, Self::Error> {
        PowerValue::new(
            fields.voltage,
            fields.current,
            fields.power,
            fields.power_factor,
        )
    }
}

impl PowerValue {
    pub fn new(voltage: f64, current: f64, power: f64, power_factor: f64) -> Result<Self, String> {
        if !(0.0..=1.0).contains(&power_factor) {
            return Err(format!(
                "powerFactor must be between 0 and 1, got {}",
                power_factor
            ));
        }
        Ok(Self {
            voltage,
            current,
            power,
            power_factor,
        })
    }

    /// Volt-amperes: voltage × current
    pub fn apparent_power(&self) -> f64 {
        self.voltage * self.current
    }

    /// sqrt(apparent² - real²), floored at zero when the reported real power
    /// exceeds the apparent power
    pub fn reactive_power(&self) -> f64 {
        let apparent = self.apparent_power();
        (apparent * apparent - self.power * self.power).max(0.0).sqrt()
    }

    pub fn efficiency_percent(&self) -> f64 {
        self.power_factor * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanValue {
    pub state: bool,
}

impl BooleanValue {
    pub fn is_active(&self) -> bool {
        self.state
    }
}

impl SensorValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            SensorValue::Scalar(_) => ValueKind::Scalar,
            SensorValue::Vibration(_) => ValueKind::Vibration,
            SensorValue::Power(_) => ValueKind::Power,
            SensorValue::Boolean(_) => ValueKind::Boolean,
        }
    }

    /// Canonical encoding of the variant's fields, without the discriminator
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            SensorValue::Scalar(v) => json!({ "value": v.value }),
            SensorValue::Vibration(v) => json!({ "x": v.x, "y": v.y, "z": v.z }),
            SensorValue::Power(v) => json!({
                "voltage": v.voltage,
                "current": v.current,
                "power": v.power,
                "powerFactor": v.power_factor,
            }),
            SensorValue::Boolean(v) => json!({ "state": v.state }),
        }
    }

    pub fn to_json_string(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Single numeric projection used for stored aggregates
    pub fn metric_value(&self) -> f64 {
        match self {
            SensorValue::Scalar(v) => v.value,
            SensorValue::Vibration(v) => v.rms(),
            SensorValue::Power(v) => v.power,
            SensorValue::Boolean(v) => {
                if v.state {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn scalar(value: f64) -> Self {
        SensorValue::Scalar(ScalarValue { value })
    }

    pub fn vibration(x: f64, y: f64, z: f64) -> Self {
        SensorValue::Vibration(VibrationValue { x, y, z })
    }

    pub fn boolean(state: bool) -> Self {
        SensorValue::Boolean(BooleanValue { state })
    }
}
