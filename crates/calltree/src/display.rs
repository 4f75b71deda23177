use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of the values stored in a profile frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueUnit {
    /// Plain counts (samples, objects)
    #[default]
    Short,
    Nanoseconds,
    Bytes,
}

/// Formatted value split into number text and unit suffix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayValue {
    pub text: String,
    pub suffix: Option<String>,
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suffix {
            Some(suffix) => write!(f, "{}{}", self.text, suffix),
            None => f.write_str(&self.text),
        }
    }
}

const SHORT_SCALES: &[(f64, &str)] = &[(1e12, " T"), (1e9, " Bil"), (1e6, " Mil"), (1e3, " K")];

const DURATION_SCALES: &[(f64, &str)] = &[
    (3.6e12, " hour"),
    (6e10, " min"),
    (1e9, " s"),
    (1e6, " ms"),
    (1e3, " µs"),
];

const BYTE_SCALES: &[(f64, &str)] = &[
    (1_099_511_627_776.0, " TiB"),
    (1_073_741_824.0, " GiB"),
    (1_048_576.0, " MiB"),
    (1024.0, " KiB"),
];

impl ValueUnit {
    pub fn display(self, value: f64) -> DisplayValue {
        let (scales, base_suffix): (&[(f64, &str)], Option<&str>) = match self {
            Self::Short => (SHORT_SCALES, None),
            Self::Nanoseconds => (DURATION_SCALES, Some(" ns")),
            Self::Bytes => (BYTE_SCALES, Some(" B")),
        };

        let magnitude = value.abs();
        for (scale, suffix) in scales {
            if magnitude >= *scale {
                return DisplayValue {
                    text: format_number(value / scale),
                    suffix: Some((*suffix).to_string()),
                };
            }
        }

        DisplayValue {
            text: format_number(value),
            suffix: base_suffix.map(str::to_string),
        }
    }
}

/// At most two decimals, trailing zeros dropped
fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let text = format!("{value:.2}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
