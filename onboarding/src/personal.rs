use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tierpass_common::{
    config::{MINIMUM_AGE, MIN_FULL_NAME_LENGTH},
    time::age_on,
};

use crate::{countries::CountryDirectory, error::FormError};

/// Personal details entered in the submission form
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    /// ISO 3166-1 alpha-2 country of residence
    pub country: String,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub residential_address: Option<String>,
}

impl PersonalInfo {
    pub fn full_name(&self) -> &str {
        self.full_name.trim()
    }

    fn has_full_name(&self) -> bool {
        self.full_name().chars().count() >= MIN_FULL_NAME_LENGTH
    }

    /// Name, date of birth and country are present
    /// This is what the document oracle needs to match against
    pub fn is_filled(&self) -> bool {
        self.has_full_name() && self.date_of_birth.is_some() && !self.country.trim().is_empty()
    }

    /// Full personal information check, first failure wins
    pub fn check(&self, countries: &CountryDirectory, today: NaiveDate) -> Result<(), FormError> {
        if !self.has_full_name() {
            return Err(FormError::MissingFullName);
        }

        let birth = self.date_of_birth.ok_or(FormError::MissingDateOfBirth)?;
        if age_on(birth, today) < MINIMUM_AGE {
            return Err(FormError::Underage(MINIMUM_AGE));
        }

        let country = self.country.trim();
        if country.is_empty() {
            return Err(FormError::MissingCountry);
        }
        if countries.is_blocked(country) {
            return Err(FormError::CountryBlocked(
                countries.name_of(country).unwrap_or(country).to_owned(),
            ));
        }

        Ok(())
    }

    /// Date of birth as sent to the backend, `YYYY-MM-DD`
    pub fn date_of_birth_string(&self) -> String {
        self.date_of_birth
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}
