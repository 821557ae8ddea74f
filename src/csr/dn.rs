use std::fmt;

use rcgen::{DistinguishedName, DnType, DnValue};
use serde::{Deserialize, Serialize};

use crate::error::{require, InputError};

/// Placeholder in the common name that is replaced by the requested FQDN.
pub const FQDN_PLACEHOLDER: &str = "{fqdn}";

/// Subject of the certificate signing request.
///
/// The fields always end up in the request in the order country, state,
/// locality, organization, common name.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SubjectName {
    pub country: String,
    pub state: String,
    pub city: String,
    pub org: String,
    pub cn: String,
}

impl Default for SubjectName {
    fn default() -> Self {
        Self {
            country: "DE".into(),
            state: "Hessen".into(),
            city: "Darmstadt".into(),
            org: "TU".into(),
            cn: FQDN_PLACEHOLDER.into(),
        }
    }
}

impl SubjectName {
    /// Substitutes [`FQDN_PLACEHOLDER`] in the common name.
    ///
    /// Only the common name is templated, the other attributes are copied
    /// as they are.
    pub fn resolve(&self, fqdn: &str) -> Self {
        Self {
            cn: self.cn.replace(FQDN_PLACEHOLDER, fqdn),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        require("country", &self.country)?;
        require("state", &self.state)?;
        require("city", &self.city)?;
        require("organization", &self.org)?;
        require("common name", &self.cn)?;
        if self.cn.contains(FQDN_PLACEHOLDER) {
            return Err(InputError::UnresolvedPlaceholder(self.cn.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for SubjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C={}, ST={}, L={}, O={}, CN={}",
            self.country, self.state, self.city, self.org, self.cn
        )
    }
}

impl From<&SubjectName> for DistinguishedName {
    fn from(value: &SubjectName) -> Self {
        let mut dn = Self::new();

        dn.push(DnType::CountryName, country_value(&value.country));
        dn.push(DnType::StateOrProvinceName, value.state.as_str());
        dn.push(DnType::LocalityName, value.city.as_str());
        dn.push(DnType::OrganizationName, value.org.as_str());
        dn.push(DnType::CommonName, value.cn.as_str());

        dn
    }
}

// X.520 wants PrintableString for the country; anything outside that
// character set is left to UTF8String.
fn country_value(country: &str) -> DnValue {
    let printable = country.chars().all(|c| {
        c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c)
    });
    if printable {
        DnValue::PrintableString(country.to_owned())
    } else {
        DnValue::Utf8String(country.to_owned())
    }
}
