//! Instrument domain — securities referenced by trades and payouts.
//!
//! The timeline has no instrument endpoint of its own. An item's icon path
//! embeds the ISIN (`logos/US0378331005/v2`) and its title is the display
//! name, which is enough to maintain a local instrument table.

use serde::{Deserialize, Serialize};

use crate::shared::Isin;
use crate::storage::Identifiable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub isin: Isin,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl Instrument {
    /// Instrument named `name`, if `icon` carries an ISIN.
    pub fn from_icon(icon: &str, name: impl Into<String>) -> Option<Self> {
        isin_from_icon(icon).map(|isin| Self {
            isin,
            name: name.into(),
            icon: Some(icon.to_string()),
        })
    }
}

impl Identifiable for Instrument {
    fn key(&self) -> &str {
        self.isin.as_str()
    }
}

/// ISIN segment of an icon path, e.g. `logos/IE00B4L5Y983/v2`.
pub fn isin_from_icon(icon: &str) -> Option<Isin> {
    icon.split('/').find_map(Isin::parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isin_from_icon() {
        assert_eq!(
            isin_from_icon("logos/US0378331005/v2").map(|i| i.to_string()),
            Some("US0378331005".to_string())
        );
        assert!(isin_from_icon("logos/timeline_plus_circle/v2").is_none());
        assert!(isin_from_icon("").is_none());
    }

    #[test]
    fn test_from_icon() {
        let inst = Instrument::from_icon("logos/IE00B4L5Y983/v2", "Core MSCI World").unwrap();
        assert_eq!(inst.key(), "IE00B4L5Y983");
        assert_eq!(inst.name, "Core MSCI World");
        assert!(Instrument::from_icon("logos/bank_transfer/v2", "Deposit").is_none());
    }
}
