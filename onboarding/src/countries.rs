use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::{debug, warn};
use tierpass_common::api::Country;

use crate::backend::KycBackend;

lazy_static! {
    // Used when the backend country list cannot be fetched
    static ref FALLBACK_COUNTRIES: Vec<Country> = vec![
        Country::new("AR", "Argentina", false),
        Country::new("AU", "Australia", false),
        Country::new("AT", "Austria", false),
        Country::new("BE", "Belgium", false),
        Country::new("BR", "Brazil", false),
        Country::new("CA", "Canada", false),
        Country::new("CH", "Switzerland", false),
        Country::new("CU", "Cuba", true),
        Country::new("DE", "Germany", false),
        Country::new("DK", "Denmark", false),
        Country::new("ES", "Spain", false),
        Country::new("FI", "Finland", false),
        Country::new("FR", "France", false),
        Country::new("GB", "United Kingdom", false),
        Country::new("IE", "Ireland", false),
        Country::new("IN", "India", false),
        Country::new("IR", "Iran", true),
        Country::new("IT", "Italy", false),
        Country::new("JP", "Japan", false),
        Country::new("KP", "North Korea", true),
        Country::new("KR", "South Korea", false),
        Country::new("MX", "Mexico", false),
        Country::new("NL", "Netherlands", false),
        Country::new("NO", "Norway", false),
        Country::new("NZ", "New Zealand", false),
        Country::new("PL", "Poland", false),
        Country::new("PT", "Portugal", false),
        Country::new("SE", "Sweden", false),
        Country::new("SG", "Singapore", false),
        Country::new("SY", "Syria", true),
        Country::new("US", "United States", false),
        Country::new("ZA", "South Africa", false),
    ];
}

/// Country list keyed by ISO code, in display order
#[derive(Debug, Clone, Default)]
pub struct CountryDirectory {
    countries: IndexMap<String, Country>,
}

impl CountryDirectory {
    pub fn new(countries: Vec<Country>) -> Self {
        let countries = countries
            .into_iter()
            .map(|country| (country.code.to_ascii_uppercase(), country))
            .collect();
        Self { countries }
    }

    /// Embedded list
    pub fn fallback() -> Self {
        Self::new(FALLBACK_COUNTRIES.clone())
    }

    /// Fetch the list from the backend, using the embedded one when the
    /// request fails or returns nothing
    pub async fn load(backend: &dyn KycBackend) -> Self {
        match backend.get_countries().await {
            Ok(countries) if !countries.is_empty() => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("Loaded {} countries from the backend", countries.len());
                }
                Self::new(countries)
            }
            Ok(_) => {
                warn!("Backend returned an empty country list, using the embedded list");
                Self::fallback()
            }
            Err(e) => {
                warn!("Error while fetching countries: {}, using the embedded list", e);
                Self::fallback()
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&Country> {
        self.countries.get(&code.trim().to_ascii_uppercase())
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.get(code).map(|country| country.name.as_str())
    }

    /// Unknown codes are not blocked, the backend has the final word
    pub fn is_blocked(&self, code: &str) -> bool {
        self.get(code).map(|country| country.blocked).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Country> {
        self.countries.values()
    }

    /// Countries that can be selected
    pub fn selectable(&self) -> impl Iterator<Item = &Country> {
        self.iter().filter(|country| !country.blocked)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback() {
        let directory = CountryDirectory::fallback();
        assert!(!directory.is_empty());
        assert!(directory.is_blocked("kp"));
        assert!(!directory.is_blocked("DE"));
        assert!(!directory.is_blocked("ZZ"));
        assert_eq!(directory.name_of(" gb "), Some("United Kingdom"));
        assert!(directory.selectable().all(|c| !c.blocked));
    }

    #[test]
    fn test_order_preserved() {
        let directory = CountryDirectory::new(vec![
            Country::new("se", "Sweden", false),
            Country::new("AT", "Austria", false),
        ]);
        let codes: Vec<_> = directory.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(codes, vec!["Sweden", "Austria"]);
        assert!(directory.get("SE").is_some());
    }
}
