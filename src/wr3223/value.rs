/// A decoded value ready to be published.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Switch(bool),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Switch(true) => write!(f, "ON"),
            Value::Switch(false) => write!(f, "OFF"),
        }
    }
}

/// A value submitted for writing to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteValue {
    Number(i32),
    Switch(bool),
}

impl WriteValue {
    /// Parse an inbound textual command payload, eg from MQTT.
    ///
    /// `ON`/`OFF`/`true`/`false` become switches, anything else must be an
    /// integer (a fractional part is truncated).
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        match input.to_ascii_lowercase().as_str() {
            "on" | "true" => return Some(WriteValue::Switch(true)),
            "off" | "false" => return Some(WriteValue::Switch(false)),
            _ => {}
        }

        if let Ok(n) = input.parse::<i32>() {
            return Some(WriteValue::Number(n));
        }
        input
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= i32::MIN as f64 && *f <= i32::MAX as f64)
            .map(|f| WriteValue::Number(f.trunc() as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Value::Number(21.5).to_string(), "21.5");
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Switch(true).to_string(), "ON");
        assert_eq!(Value::Switch(false).to_string(), "OFF");
    }

    #[test]
    fn parse_write_value() {
        assert_eq!(WriteValue::parse("ON"), Some(WriteValue::Switch(true)));
        assert_eq!(WriteValue::parse("false"), Some(WriteValue::Switch(false)));
        assert_eq!(WriteValue::parse(" 2 "), Some(WriteValue::Number(2)));
        assert_eq!(WriteValue::parse("-5"), Some(WriteValue::Number(-5)));
        assert_eq!(WriteValue::parse("21.7"), Some(WriteValue::Number(21)));
        assert_eq!(WriteValue::parse("warm"), None);
    }
}
