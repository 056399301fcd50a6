use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short. Multiplying a price difference by the sign
    /// turns it into a favorable (positive) or adverse (negative) move.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Long => "Long",
            Side::Short => "Short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_orients_price_moves() {
        assert_eq!(Side::Long.sign() * (105.0 - 100.0), 5.0);
        assert_eq!(Side::Short.sign() * (105.0 - 100.0), -5.0);
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(Side::Short.to_string(), "Short");
    }
}
