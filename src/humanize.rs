//! Human-readable byte sizes for configuration values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ByteSizeError {
    #[error("empty size value")]
    Empty,

    #[error("invalid number in size '{0}'")]
    InvalidNumber(String),

    #[error("unknown size unit '{0}'")]
    InvalidUnit(String),

    #[error("size '{0}' does not fit in 64 bits")]
    Overflow(String),
}

/// Byte count that deserializes from `"200MB"`-style strings or plain integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn from_megabytes(mb: u64) -> Self {
        ByteSize(mb.saturating_mul(MIB))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Largest binary unit that divides the value exactly
    fn exact_unit(&self) -> (u64, &'static str) {
        for (divisor, unit) in [(GIB, "GB"), (MIB, "MB"), (KIB, "KB")] {
            if self.0 >= divisor && self.0 % divisor == 0 {
                return (self.0 / divisor, unit);
            }
        }
        (self.0, "B")
    }

    /// Compact form accepted by yt-dlp's size options (`200M`, `1G`, `512`)
    pub fn to_cli_arg(&self) -> String {
        match self.exact_unit() {
            (value, "B") => value.to_string(),
            (value, unit) => format!("{}{}", value, &unit[..1]),
        }
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ByteSizeError::Empty);
        }

        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);

        let value: u64 = digits
            .parse()
            .map_err(|_| ByteSizeError::InvalidNumber(s.to_string()))?;

        let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => MIB,
            "G" | "GB" | "GIB" => GIB,
            other => return Err(ByteSizeError::InvalidUnit(other.to_string())),
        };

        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ByteSizeError::Overflow(s.to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (value, unit) = self.exact_unit();
        write!(f, "{}{}", value, unit)
    }
}

impl Serialize for ByteSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl<'de> serde::de::Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size as string (e.g., \"200MB\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte size must not be negative"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("1K".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("200MB".parse::<ByteSize>().unwrap().as_u64(), 200 * MIB);
        assert_eq!("200 mib".parse::<ByteSize>().unwrap().as_u64(), 200 * MIB);
        assert_eq!("2G".parse::<ByteSize>().unwrap().as_u64(), 2 * GIB);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<ByteSize>(), Err(ByteSizeError::Empty));
        assert!(matches!(
            "MB".parse::<ByteSize>(),
            Err(ByteSizeError::InvalidNumber(_))
        ));
        assert!(matches!(
            "5PB".parse::<ByteSize>(),
            Err(ByteSizeError::InvalidUnit(_))
        ));
        assert!(matches!(
            "99999999999999GB".parse::<ByteSize>(),
            Err(ByteSizeError::Overflow(_))
        ));
    }

    #[test]
    fn test_from_megabytes() {
        assert_eq!(ByteSize::from_megabytes(200).as_u64(), 209_715_200);
    }

    #[test]
    fn test_display_and_cli_arg() {
        assert_eq!(ByteSize::from_megabytes(200).to_string(), "200MB");
        assert_eq!(ByteSize::from_megabytes(200).to_cli_arg(), "200M");
        assert_eq!(ByteSize(GIB).to_cli_arg(), "1G");
        assert_eq!(ByteSize(1500).to_cli_arg(), "1500");
        assert_eq!(ByteSize(1500).to_string(), "1500B");
    }

    #[test]
    fn test_deserialize_string_and_number() {
        #[derive(Deserialize)]
        struct Limits {
            max_file_size: ByteSize,
        }

        let parsed: Limits = serde_json::from_str(r#"{"max_file_size": "10MB"}"#).unwrap();
        assert_eq!(parsed.max_file_size, ByteSize::from_megabytes(10));

        let parsed: Limits = serde_json::from_str(r#"{"max_file_size": 4096}"#).unwrap();
        assert_eq!(parsed.max_file_size.as_u64(), 4096);
    }
}
