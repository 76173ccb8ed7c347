//! Shared serialization/deserialization utilities for configuration and the rule store

/// Helper module for Duration serialization as seconds
///
/// Serializes `std::time::Duration` as a u64 number of seconds, which reads
/// better in TOML than a struct.
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Helper module for Duration serialization as milliseconds
pub mod duration_millis {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserialize a Duration from milliseconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for port numbers stored as strings
///
/// Rule stores written by hand or by older tooling carry the listen port as
/// either `"9000"` or `9000`. Both are accepted; the string form is written.
pub mod port_string {
    use serde::{self, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u64),
        Text(String),
    }

    /// Serialize a port as a decimal string
    pub fn serialize<S>(port: &u16, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&port.to_string())
    }

    /// Deserialize a port from a string or an integer
    pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
    where
        D: Deserializer<'de>,
    {
        let port = match PortRepr::deserialize(deserializer)? {
            PortRepr::Number(n) => u16::try_from(n).map_err(serde::de::Error::custom)?,
            PortRepr::Text(s) => s.trim().parse::<u16>().map_err(serde::de::Error::custom)?,
        };
        if port == 0 {
            return Err(serde::de::Error::custom("port must be between 1 and 65535"));
        }
        Ok(port)
    }
}
