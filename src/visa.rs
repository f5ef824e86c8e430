//! Static visa ruleset.
//!
//! Jurisdictional data only: which countries want a visa for transit or
//! entry. Plugged into the evaluator through [`VisaLookup`] so the table can
//! be replaced without touching scoring.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::airports;
use crate::traits::VisaLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaPurpose {
    Transit,
    Entry,
}

/// A visa the traveller may need for one airport on the itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaFlag {
    pub airport: String,
    pub country: String,
    pub purpose: VisaPurpose,
    pub note: String,
}

/// Country-keyed visa table. Airports are mapped to countries through the
/// airport reference table; airports outside it are never flagged.
#[derive(Debug, Clone, Default)]
pub struct StaticVisaTable {
    home_country: Option<String>,
    rules: HashMap<(String, VisaPurpose), String>,
}

impl StaticVisaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Airports in the home country are never flagged.
    pub fn home_country(mut self, country: &str) -> Self {
        self.home_country = Some(country.to_ascii_uppercase());
        self
    }

    pub fn require(mut self, country: &str, purpose: VisaPurpose, note: &str) -> Self {
        self.rules
            .insert((country.to_ascii_uppercase(), purpose), note.to_string());
        self
    }
}

impl VisaLookup for StaticVisaTable {
    fn requirement(&self, airport: &str, purpose: VisaPurpose) -> Option<VisaFlag> {
        let country = airports::country_of(airport)?;
        if self.home_country.as_deref() == Some(country) {
            return None;
        }
        let note = self.rules.get(&(country.to_string(), purpose))?;
        Some(VisaFlag {
            airport: airport.to_ascii_uppercase(),
            country: country.to_string(),
            purpose,
            note: note.clone(),
        })
    }
}

/// Lookup that never flags anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVisaRules;

impl VisaLookup for NoVisaRules {
    fn requirement(&self, _airport: &str, _purpose: VisaPurpose) -> Option<VisaFlag> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StaticVisaTable {
        StaticVisaTable::new()
            .home_country("CA")
            .require("GB", VisaPurpose::Transit, "Direct airside transit visa may apply")
            .require("CN", VisaPurpose::Entry, "Tourist visa required")
            .require("CA", VisaPurpose::Entry, "eTA")
    }

    #[test]
    fn test_flags_transit_rule() {
        let flag = table().requirement("LHR", VisaPurpose::Transit).unwrap();
        assert_eq!(flag.country, "GB");
        assert_eq!(flag.purpose, VisaPurpose::Transit);
        assert!(table().requirement("LHR", VisaPurpose::Entry).is_none());
    }

    #[test]
    fn test_home_country_is_never_flagged() {
        assert!(table().requirement("YYZ", VisaPurpose::Entry).is_none());
    }

    #[test]
    fn test_unknown_airport_is_not_flagged() {
        assert!(table().requirement("XXX", VisaPurpose::Entry).is_none());
        assert!(NoVisaRules.requirement("PEK", VisaPurpose::Entry).is_none());
    }
}
