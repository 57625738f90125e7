use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO-4217-like currency code attached to every expense, share and
/// settlement.
///
/// Currencies are kept segregated: the engine never converts between them and
/// never guesses one. Callers must always pass an explicit code.
///
/// ## Minor units
///
/// The engine stores monetary values as an `i64` number of **minor units**
/// (see `MoneyCents`). Every supported code uses 2 fraction digits, so
/// `10.50 EUR` ⇄ `1050`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Canonical (uppercase) currency code.
    #[must_use]
    pub fn code(&self) -> &str {
        // Only ASCII uppercase letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Number of fraction digits used when formatting/parsing amounts.
    #[must_use]
    pub const fn minor_units(self) -> u8 {
        2
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        let bytes = normalized.as_bytes();
        match bytes {
            [a, b, c] if bytes.iter().all(u8::is_ascii_uppercase) => Ok(Self([*a, *b, *c])),
            _ => Err(EngineError::InvalidInput(format!(
                "invalid currency code: {value}"
            ))),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::try_from(value.as_str())
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_codes() {
        assert_eq!(Currency::try_from("eur").unwrap().code(), "EUR");
        assert_eq!(Currency::try_from(" USD ").unwrap().to_string(), "USD");
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(Currency::try_from("").is_err());
        assert!(Currency::try_from("EURO").is_err());
        assert!(Currency::try_from("E1R").is_err());
        assert!(Currency::try_from("€").is_err());
    }

    #[test]
    fn serde_uses_plain_code() {
        let eur = Currency::try_from("EUR").unwrap();
        assert_eq!(serde_json::to_string(&eur).unwrap(), "\"EUR\"");
        let back: Currency = serde_json::from_str("\"gbp\"").unwrap();
        assert_eq!(back.code(), "GBP");
    }
}
