//! Temperature scales and the four supported conversions.

use std::fmt;

use crate::error::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl Scale {
    pub fn symbol(&self) -> &'static str {
        match self {
            Scale::Celsius => "°C",
            Scale::Fahrenheit => "°F",
            Scale::Kelvin => "K",
        }
    }

    /// Lowest physically meaningful value on this scale.
    pub fn absolute_zero(&self) -> f64 {
        match self {
            Scale::Celsius => -273.15,
            Scale::Fahrenheit => -459.67,
            Scale::Kelvin => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    CelsiusToFahrenheit,
    FahrenheitToCelsius,
    CelsiusToKelvin,
    KelvinToCelsius,
}

impl Conversion {
    pub const ALL: [Conversion; 4] = [
        Conversion::CelsiusToFahrenheit,
        Conversion::FahrenheitToCelsius,
        Conversion::CelsiusToKelvin,
        Conversion::KelvinToCelsius,
    ];

    pub fn from_scale(&self) -> Scale {
        match self {
            Conversion::CelsiusToFahrenheit | Conversion::CelsiusToKelvin => Scale::Celsius,
            Conversion::FahrenheitToCelsius => Scale::Fahrenheit,
            Conversion::KelvinToCelsius => Scale::Kelvin,
        }
    }

    pub fn to_scale(&self) -> Scale {
        match self {
            Conversion::CelsiusToFahrenheit => Scale::Fahrenheit,
            Conversion::FahrenheitToCelsius | Conversion::KelvinToCelsius => Scale::Celsius,
            Conversion::CelsiusToKelvin => Scale::Kelvin,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Conversion::CelsiusToFahrenheit => "Celsius → Fahrenheit",
            Conversion::FahrenheitToCelsius => "Fahrenheit → Celsius",
            Conversion::CelsiusToKelvin => "Celsius → Kelvin",
            Conversion::KelvinToCelsius => "Kelvin → Celsius",
        }
    }

    /// Get the next conversion (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Conversion::CelsiusToFahrenheit => Conversion::FahrenheitToCelsius,
            Conversion::FahrenheitToCelsius => Conversion::CelsiusToKelvin,
            Conversion::CelsiusToKelvin => Conversion::KelvinToCelsius,
            Conversion::KelvinToCelsius => Conversion::CelsiusToFahrenheit,
        }
    }

    /// Get the previous conversion (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Conversion::CelsiusToFahrenheit => Conversion::KelvinToCelsius,
            Conversion::FahrenheitToCelsius => Conversion::CelsiusToFahrenheit,
            Conversion::CelsiusToKelvin => Conversion::FahrenheitToCelsius,
            Conversion::KelvinToCelsius => Conversion::CelsiusToKelvin,
        }
    }

    pub fn apply(&self, value: f64) -> Result<f64, ConversionError> {
        let from = self.from_scale();
        if value < from.absolute_zero() {
            return Err(ConversionError::BelowAbsoluteZero {
                value,
                symbol: from.symbol(),
            });
        }
        Ok(match self {
            Conversion::CelsiusToFahrenheit => value * 9.0 / 5.0 + 32.0,
            Conversion::FahrenheitToCelsius => (value - 32.0) * 5.0 / 9.0,
            Conversion::CelsiusToKelvin => value + 273.15,
            Conversion::KelvinToCelsius => value - 273.15,
        })
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A completed conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub conversion: Conversion,
    pub input: f64,
    pub output: f64,
}

impl Reading {
    /// `"23.5°C"`, `"100.0°C"`. Whole numbers keep their decimal point.
    pub fn input_label(&self) -> String {
        format!("{:?}{}", self.input, self.conversion.from_scale().symbol())
    }

    /// `"74.30°F"`
    pub fn output_label(&self) -> String {
        format!("{:.2}{}", self.output, self.conversion.to_scale().symbol())
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.input_label(), self.output_label())
    }
}

/// Parse user input and run `conversion` on it.
pub fn convert(conversion: Conversion, text: &str) -> Result<Reading, ConversionError> {
    let input = parse_temperature(text)?;
    let output = conversion.apply(input)?;
    Ok(Reading {
        conversion,
        input,
        output,
    })
}

fn parse_temperature(text: &str) -> Result<f64, ConversionError> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ConversionError::InvalidNumber(trimmed.to_string())),
    }
}

/// Whether `text` is acceptable while the user is still typing.
///
/// Accepts complete numbers and the prefixes a number passes through
/// (`""`, `"-"`, `"."`, `"-."`).
pub fn is_acceptable_partial(text: &str) -> bool {
    matches!(text, "" | "-" | "." | "-.") || (text.trim() == text && parse_temperature(text).is_ok())
}
