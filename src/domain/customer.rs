use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

pub type CustomerId = u64;
pub type VehicleId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub vip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub customer_id: CustomerId,
    pub license_plate: String,
    pub model: Option<String>,
}

/// Customer details captured at the counter, before any record exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub vip: bool,
}

impl CustomerInfo {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "Customer name is required".to_string(),
            ));
        }
        if self.phone.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "Customer phone is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVehicle {
    pub customer_id: CustomerId,
    pub license_plate: String,
    pub model: Option<String>,
}

/// Normalizes a plate for lookups: uppercase, no whitespace.
pub fn normalize_plate(plate: &str) -> String {
    plate
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// How an auxiliary entity reference was obtained.
///
/// `Placeholder` means creation failed and the configured fallback reference
/// was substituted; callers decide whether that is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Existing(u64),
    Created(u64),
    Placeholder(u64),
}

impl EntityRef {
    pub fn id(&self) -> u64 {
        match self {
            EntityRef::Existing(id) | EntityRef::Created(id) | EntityRef::Placeholder(id) => *id,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, EntityRef::Placeholder(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_info_requires_name_and_phone() {
        let mut info = CustomerInfo {
            name: "Budi".into(),
            phone: "0812".into(),
            ..Default::default()
        };
        assert!(info.validate().is_ok());

        info.phone = "  ".into();
        assert!(matches!(
            info.validate(),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_normalize_plate() {
        assert_eq!(normalize_plate(" b 1234 xy "), "B1234XY");
    }

    #[test]
    fn test_entity_ref_id() {
        assert_eq!(EntityRef::Placeholder(1).id(), 1);
        assert!(EntityRef::Placeholder(1).is_placeholder());
        assert!(!EntityRef::Created(7).is_placeholder());
    }
}
