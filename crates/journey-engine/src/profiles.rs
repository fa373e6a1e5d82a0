//! Canned synthetic shipping-address profiles, one per destination region.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddressProfile {
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub email: &'static str,
    pub phone: &'static str,
    pub address1: &'static str,
    pub city: &'static str,
    pub region: &'static str,
    pub postal_code: &'static str,
    /// ISO 3166-1 alpha-2.
    pub country: &'static str,
}

static PROFILES: Lazy<HashMap<&'static str, AddressProfile>> = Lazy::new(|| {
    let mut profiles = HashMap::new();
    profiles.insert(
        "US",
        AddressProfile {
            first_name: "Avery",
            last_name: "Collins",
            email: "avery.collins.audit@example.com",
            phone: "+1 415 555 0132",
            address1: "548 Market St",
            city: "San Francisco",
            region: "CA",
            postal_code: "94104",
            country: "US",
        },
    );
    profiles.insert(
        "GB",
        AddressProfile {
            first_name: "Harriet",
            last_name: "Doyle",
            email: "harriet.doyle.audit@example.com",
            phone: "+44 20 7946 0958",
            address1: "12 Southwark Street",
            city: "London",
            region: "Greater London",
            postal_code: "SE1 1TL",
            country: "GB",
        },
    );
    profiles.insert(
        "DE",
        AddressProfile {
            first_name: "Jonas",
            last_name: "Keller",
            email: "jonas.keller.audit@example.com",
            phone: "+49 30 901820",
            address1: "Torstraße 140",
            city: "Berlin",
            region: "Berlin",
            postal_code: "10119",
            country: "DE",
        },
    );
    profiles.insert(
        "FR",
        AddressProfile {
            first_name: "Camille",
            last_name: "Robert",
            email: "camille.robert.audit@example.com",
            phone: "+33 1 40 20 30 40",
            address1: "18 Rue du Temple",
            city: "Paris",
            region: "Île-de-France",
            postal_code: "75004",
            country: "FR",
        },
    );
    profiles.insert(
        "CA",
        AddressProfile {
            first_name: "Noah",
            last_name: "Tremblay",
            email: "noah.tremblay.audit@example.com",
            phone: "+1 416 555 0188",
            address1: "220 Yonge St",
            city: "Toronto",
            region: "ON",
            postal_code: "M5B 2H1",
            country: "CA",
        },
    );
    profiles.insert(
        "AU",
        AddressProfile {
            first_name: "Isla",
            last_name: "Murphy",
            email: "isla.murphy.audit@example.com",
            phone: "+61 2 9374 4000",
            address1: "48 Pirrama Rd",
            city: "Sydney",
            region: "NSW",
            postal_code: "2009",
            country: "AU",
        },
    );
    profiles
});

/// Profile for a country code, falling back to the US profile for regions
/// without a canned identity.
pub fn profile_for(country: &str) -> &'static AddressProfile {
    let code = country.trim().to_uppercase();
    PROFILES
        .get(code.as_str())
        .unwrap_or_else(|| PROFILES.get("US").expect("US profile is always present"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(profile_for("gb").country, "GB");
        assert_eq!(profile_for(" de ").country, "DE");
    }

    #[test]
    fn unknown_regions_fall_back_to_us() {
        assert_eq!(profile_for("JP").country, "US");
        assert_eq!(profile_for("").country, "US");
    }

    #[test]
    fn every_profile_is_regionally_coherent() {
        for (code, profile) in PROFILES.iter() {
            assert_eq!(profile.country, *code);
            assert!(!profile.postal_code.is_empty());
            assert!(profile.email.ends_with("@example.com"));
        }
    }
}
