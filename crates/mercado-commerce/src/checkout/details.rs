//! Buyer-supplied checkout details.

use serde::{Deserialize, Serialize};

use crate::error::CommerceError;

/// Invoicing data for a business buyer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FiscalData {
    /// RIF-style tax id, stored normalized (e.g. `J123456789`).
    pub tax_id: String,
    pub business_name: String,
    pub fiscal_address: String,
}

impl FiscalData {
    pub fn new(
        tax_id: impl AsRef<str>,
        business_name: impl Into<String>,
        fiscal_address: impl Into<String>,
    ) -> Result<Self, CommerceError> {
        let data = Self {
            tax_id: normalize_tax_id(tax_id.as_ref())?,
            business_name: business_name.into().trim().to_string(),
            fiscal_address: fiscal_address.into().trim().to_string(),
        };
        data.validate()?;
        Ok(data)
    }

    /// Check every field is present and the tax id is well formed.
    pub fn validate(&self) -> Result<(), CommerceError> {
        normalize_tax_id(&self.tax_id)?;
        require("business name", &self.business_name)?;
        require("fiscal address", &self.fiscal_address)
    }
}

/// Strip separators and check the `<letter><6-10 digits>` shape.
///
/// The letter is the taxpayer kind: V and E for individuals, J for companies,
/// G for government, P for passports. The last digit may be a check digit.
pub fn normalize_tax_id(raw: &str) -> Result<String, CommerceError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '.'))
        .collect::<String>()
        .to_uppercase();

    let mut chars = cleaned.chars();
    let valid = match chars.next() {
        Some('V' | 'E' | 'J' | 'G' | 'P') => {
            let digits = chars.as_str();
            (6..=10).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    };

    if !valid {
        return Err(CommerceError::ValidationError(format!(
            "invalid tax id: {raw:?}"
        )));
    }
    Ok(cleaned)
}

/// Point on the map picked by the buyer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Where and to whom the order ships.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryInfo {
    pub address: String,
    pub city: String,
    pub state: String,
    pub contact_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl DeliveryInfo {
    pub fn new(
        address: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        contact_phone: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            city: city.into(),
            state: state.into(),
            contact_phone: contact_phone.into(),
            notes: None,
            coordinates: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates {
            latitude,
            longitude,
        });
        self
    }

    pub fn validate(&self) -> Result<(), CommerceError> {
        require("address", &self.address)?;
        require("city", &self.city)?;
        require("state", &self.state)?;
        require("contact phone", &self.contact_phone)?;

        let digits = self.contact_phone.chars().filter(char::is_ascii_digit).count();
        let allowed = self
            .contact_phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
        if !allowed || !(10..=15).contains(&digits) {
            return Err(CommerceError::ValidationError(format!(
                "invalid contact phone: {:?}",
                self.contact_phone
            )));
        }

        if let Some(Coordinates {
            latitude,
            longitude,
        }) = self.coordinates
        {
            if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                return Err(CommerceError::ValidationError(format!(
                    "coordinates out of range: {latitude}, {longitude}"
                )));
            }
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<(), CommerceError> {
    if value.trim().is_empty() {
        return Err(CommerceError::ValidationError(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_id_normalization() {
        assert_eq!(normalize_tax_id("j-12345678-9").unwrap(), "J123456789");
        assert_eq!(normalize_tax_id("V 1234567").unwrap(), "V1234567");
        assert!(normalize_tax_id("X12345678").is_err());
        assert!(normalize_tax_id("J123").is_err());
        assert!(normalize_tax_id("J12345678A").is_err());
        assert!(normalize_tax_id("").is_err());
    }

    #[test]
    fn test_fiscal_data_requires_fields() {
        assert!(FiscalData::new("J-30123456-7", "Bodega La Esquina", "Av. Bolívar, Valencia").is_ok());
        assert!(FiscalData::new("J-30123456-7", "  ", "Av. Bolívar").is_err());
    }

    #[test]
    fn test_delivery_validation() {
        let info = DeliveryInfo::new("Calle 5, Local 2", "Maracay", "Aragua", "+58 412-555-0101");
        assert!(info.validate().is_ok());

        let bad_phone = DeliveryInfo::new("Calle 5", "Maracay", "Aragua", "call me");
        assert!(bad_phone.validate().is_err());

        let bad_point = info.clone().with_coordinates(120.0, 0.0);
        assert!(bad_point.validate().is_err());

        let missing_city = DeliveryInfo::new("Calle 5", "", "Aragua", "04125550101");
        assert!(missing_city.validate().is_err());
    }
}
