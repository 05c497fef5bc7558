use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Shape of a sensor value payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Scalar,
    Vibration,
    Power,
    Boolean,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Scalar => "scalar",
            ValueKind::Vibration => "vibration",
            ValueKind::Power => "power",
            ValueKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog of supported sensor kinds.
///
/// Each sensor type fixes the physical unit stamped on outbound events and the
/// value shape a reading must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    Temperature,
    Humidity,
    Pressure,
    Speed,
    SpindleRpm,
    FanRpm,
    Vibration,
    Power,
    Proximity,
    Contact,
}

impl SensorType {
    pub const ALL: [SensorType; 10] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Pressure,
        SensorType::Speed,
        SensorType::SpindleRpm,
        SensorType::FanRpm,
        SensorType::Vibration,
        SensorType::Power,
        SensorType::Proximity,
        SensorType::Contact,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Pressure => "pressure",
            SensorType::Speed => "speed",
            SensorType::SpindleRpm => "spindle_rpm",
            SensorType::FanRpm => "fan_rpm",
            SensorType::Vibration => "vibration",
            SensorType::Power => "power",
            SensorType::Proximity => "proximity",
            SensorType::Contact => "contact",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            SensorType::Temperature => "celsius",
            SensorType::Humidity => "percent",
            SensorType::Pressure => "bar",
            SensorType::Speed => "m_per_sec",
            SensorType::SpindleRpm | SensorType::FanRpm => "rpm",
            SensorType::Vibration => "g",
            SensorType::Power => "mixed",
            SensorType::Proximity | SensorType::Contact => "boolean",
        }
    }

    /// Value shape a reading of this sensor type must carry
    pub fn required_kind(&self) -> ValueKind {
        match self {
            SensorType::Temperature
            | SensorType::Humidity
            | SensorType::Pressure
            | SensorType::Speed
            | SensorType::SpindleRpm
            | SensorType::FanRpm => ValueKind::Scalar,
            SensorType::Vibration => ValueKind::Vibration,
            SensorType::Power => ValueKind::Power,
            SensorType::Proximity | SensorType::Contact => ValueKind::Boolean,
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensorType {
    type Err = UnknownCatalogName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCatalogName {
                kind: "sensor type",
                name: s.to_string(),
            })
    }
}

impl Serialize for SensorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for SensorType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Category of the device that produced a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    CncMachine,
    Hvac,
    Conveyor,
    Compressor,
    AccessDoor,
}

impl DeviceType {
    pub const ALL: [DeviceType; 5] = [
        DeviceType::CncMachine,
        DeviceType::Hvac,
        DeviceType::Conveyor,
        DeviceType::Compressor,
        DeviceType::AccessDoor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DeviceType::CncMachine => "cnc_machine",
            DeviceType::Hvac => "hvac",
            DeviceType::Conveyor => "conveyor",
            DeviceType::Compressor => "compressor",
            DeviceType::AccessDoor => "access_door",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceType {
    type Err = UnknownCatalogName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCatalogName {
                kind: "device type",
                name: s.to_string(),
            })
    }
}

impl Serialize for DeviceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DeviceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {name}")]
pub struct UnknownCatalogName {
    pub kind: &'static str,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_units_and_kinds() {
        assert_eq!(SensorType::Temperature.unit(), "celsius");
        assert_eq!(SensorType::Speed.unit(), "m_per_sec");
        assert_eq!(SensorType::Vibration.required_kind(), ValueKind::Vibration);
        assert_eq!(SensorType::Power.unit(), "mixed");
        assert_eq!(SensorType::Contact.required_kind(), ValueKind::Boolean);

        let scalar_count = SensorType::ALL
            .iter()
            .filter(|t| t.required_kind() == ValueKind::Scalar)
            .count();
        assert_eq!(scalar_count, 6);
    }

    #[test]
    fn test_sensor_type_parse_is_case_insensitive() {
        assert_eq!("SPINDLE_RPM".parse::<SensorType>(), Ok(SensorType::SpindleRpm));
        assert_eq!("Temperature".parse::<SensorType>(), Ok(SensorType::Temperature));
    }

    #[test]
    fn test_unknown_sensor_type_rejected() {
        let err = "torque".parse::<SensorType>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown sensor type: torque");

        let decoded: Result<SensorType, _> = serde_json::from_str("\"torque\"");
        assert!(decoded.is_err());
    }

    #[test]
    fn test_device_type_serde() {
        let decoded: DeviceType = serde_json::from_str("\"CNC_MACHINE\"").unwrap();
        assert_eq!(decoded, DeviceType::CncMachine);
        assert_eq!(
            serde_json::to_string(&DeviceType::AccessDoor).unwrap(),
            "\"access_door\""
        );
        assert!(serde_json::from_str::<DeviceType>("\"forklift\"").is_err());
    }
}
