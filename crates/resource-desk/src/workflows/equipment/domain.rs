use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::audit::AuditFields;
use crate::workflows::directory::UserId;
use crate::workflows::error::WorkflowError;

/// Inventory tag. Tags are compared trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct AssetTag(pub String);

impl AssetTag {
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_ascii_uppercase())
    }

    pub(crate) fn normalized(&self) -> Self {
        Self::new(&self.0)
    }

    pub fn lock_key(&self) -> String {
        format!("equipment:{}", self.0)
    }
}

impl From<String> for AssetTag {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl fmt::Display for AssetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    Laptop,
    Desktop,
    Projector,
    Printer,
    Tablet,
    Monitor,
    NetworkDevice,
    Other,
}

impl EquipmentType {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Laptop,
            Self::Desktop,
            Self::Projector,
            Self::Printer,
            Self::Tablet,
            Self::Monitor,
            Self::NetworkDevice,
            Self::Other,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Laptop => "laptop",
            Self::Desktop => "desktop",
            Self::Projector => "projector",
            Self::Printer => "printer",
            Self::Tablet => "tablet",
            Self::Monitor => "monitor",
            Self::NetworkDevice => "network device",
            Self::Other => "other",
        }
    }
}

/// Where a unit currently is in its loan lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    OnLoan,
    InMaintenance,
    Damaged,
    Lost,
    Retired,
}

impl AvailabilityStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Available,
            Self::OnLoan,
            Self::InMaintenance,
            Self::Damaged,
            Self::Lost,
            Self::Retired,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::OnLoan => "on_loan",
            Self::InMaintenance => "in_maintenance",
            Self::Damaged => "damaged",
            Self::Lost => "lost",
            Self::Retired => "retired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    Good,
    Fair,
    Damaged,
    Lost,
}

impl ConditionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Damaged => "damaged",
            Self::Lost => "lost",
        }
    }
}

/// State of a unit as handed back at the end of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnCondition {
    Good,
    Damaged,
    Lost,
}

impl ReturnCondition {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Damaged => "damaged",
            Self::Lost => "lost",
        }
    }

    pub const fn is_incident(self) -> bool {
        !matches!(self, Self::Good)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentRegistration {
    pub asset_tag: AssetTag,
    pub equipment_type: EquipmentType,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub asset_tag: AssetTag,
    pub equipment_type: EquipmentType,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub location: Option<String>,
    pub department: Option<String>,
    pub availability_status: AvailabilityStatus,
    pub condition_status: ConditionStatus,
    /// Holder while the unit is on loan.
    pub assigned_to: Option<UserId>,
    pub audit: AuditFields,
    #[serde(default)]
    pub version: u64,
}

impl Equipment {
    pub fn register(registration: EquipmentRegistration, by: &UserId, at: DateTime<Utc>) -> Self {
        Self {
            asset_tag: registration.asset_tag,
            equipment_type: registration.equipment_type,
            brand: registration.brand,
            model: registration.model,
            serial_number: registration.serial_number,
            location: registration.location,
            department: registration.department,
            availability_status: AvailabilityStatus::Available,
            condition_status: ConditionStatus::Good,
            assigned_to: None,
            audit: AuditFields::new(by, at),
            version: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability_status == AvailabilityStatus::Available
    }

    fn transition(
        &mut self,
        action: &'static str,
        allowed: &[AvailabilityStatus],
        next: AvailabilityStatus,
    ) -> Result<(), WorkflowError> {
        if !allowed.contains(&self.availability_status) {
            return Err(WorkflowError::InvalidTransition {
                entity: "equipment",
                id: self.asset_tag.0.clone(),
                status: self.availability_status.label(),
                action,
            });
        }
        self.availability_status = next;
        Ok(())
    }

    pub fn check_out(&mut self, holder: &UserId) -> Result<(), WorkflowError> {
        self.transition(
            "be issued",
            &[AvailabilityStatus::Available],
            AvailabilityStatus::OnLoan,
        )?;
        self.assigned_to = Some(holder.clone());
        Ok(())
    }

    pub fn check_in(&mut self, condition: ReturnCondition) -> Result<(), WorkflowError> {
        let (next, condition_status) = match condition {
            ReturnCondition::Good => (AvailabilityStatus::Available, self.condition_status),
            ReturnCondition::Damaged => (AvailabilityStatus::Damaged, ConditionStatus::Damaged),
            ReturnCondition::Lost => (AvailabilityStatus::Lost, ConditionStatus::Lost),
        };
        self.transition("be returned", &[AvailabilityStatus::OnLoan], next)?;
        self.condition_status = condition_status;
        self.assigned_to = None;
        Ok(())
    }

    pub fn send_to_maintenance(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "go into maintenance",
            &[AvailabilityStatus::Available, AvailabilityStatus::Damaged],
            AvailabilityStatus::InMaintenance,
        )
    }

    pub fn release_from_maintenance(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "leave maintenance",
            &[AvailabilityStatus::InMaintenance],
            AvailabilityStatus::Available,
        )?;
        self.condition_status = ConditionStatus::Good;
        Ok(())
    }

    pub fn retire(&mut self) -> Result<(), WorkflowError> {
        self.transition(
            "be retired",
            &[
                AvailabilityStatus::Available,
                AvailabilityStatus::InMaintenance,
                AvailabilityStatus::Damaged,
                AvailabilityStatus::Lost,
            ],
            AvailabilityStatus::Retired,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn laptop() -> Equipment {
        let by = UserId("bpm".to_string());
        Equipment::register(
            EquipmentRegistration {
                asset_tag: AssetTag("ICT-LPT-001".to_string()),
                equipment_type: EquipmentType::Laptop,
                brand: Some("Dell".to_string()),
                model: Some("Latitude 5440".to_string()),
                serial_number: None,
                location: None,
                department: None,
            },
            &by,
            Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).single().expect("valid"),
        )
    }

    #[test]
    fn loan_round_trip_returns_unit_to_pool() {
        let mut unit = laptop();
        let holder = UserId("applicant".to_string());
        unit.check_out(&holder).expect("issue");
        assert_eq!(unit.availability_status, AvailabilityStatus::OnLoan);
        assert_eq!(unit.assigned_to.as_ref(), Some(&holder));

        unit.check_in(ReturnCondition::Good).expect("return");
        assert!(unit.is_available());
        assert!(unit.assigned_to.is_none());
    }

    #[test]
    fn damaged_return_goes_through_maintenance() {
        let mut unit = laptop();
        unit.check_out(&UserId("applicant".to_string())).expect("issue");
        unit.check_in(ReturnCondition::Damaged).expect("return");
        assert_eq!(unit.availability_status, AvailabilityStatus::Damaged);
        assert_eq!(unit.condition_status, ConditionStatus::Damaged);

        unit.send_to_maintenance().expect("maintenance");
        unit.release_from_maintenance().expect("release");
        assert!(unit.is_available());
        assert_eq!(unit.condition_status, ConditionStatus::Good);
    }

    #[test]
    fn units_on_loan_cannot_be_retired_or_reissued() {
        let mut unit = laptop();
        unit.check_out(&UserId("applicant".to_string())).expect("issue");
        assert!(unit.retire().is_err());
        assert!(unit.check_out(&UserId("other".to_string())).is_err());
        assert!(unit.send_to_maintenance().is_err());
    }

    #[test]
    fn lost_units_can_only_be_retired() {
        let mut unit = laptop();
        unit.check_out(&UserId("applicant".to_string())).expect("issue");
        unit.check_in(ReturnCondition::Lost).expect("lost");
        assert!(unit.send_to_maintenance().is_err());
        unit.retire().expect("retire");
        assert_eq!(unit.availability_status, AvailabilityStatus::Retired);
    }

    #[test]
    fn asset_tags_are_normalised_on_the_way_in() {
        assert_eq!(AssetTag::new("  ict-lpt-001 "), AssetTag("ICT-LPT-001".to_string()));
        let parsed: AssetTag = serde_json::from_str("\"ict-prj-002\"").expect("parses");
        assert_eq!(parsed.0, "ICT-PRJ-002");
        assert_eq!(
            serde_json::to_value(&parsed).expect("serialises"),
            serde_json::json!("ICT-PRJ-002")
        );
    }
}
