//! The ICT equipment register and its CSV import.

pub mod domain;
pub mod import;
pub mod router;
pub mod service;

pub use domain::{
    AssetTag, AvailabilityStatus, ConditionStatus, Equipment, EquipmentRegistration,
    EquipmentType, ReturnCondition,
};
pub use import::{
    EquipmentImporter, ImportBatch, ImportError, ImportSummary, ParsedRegistration, SkippedRow,
};
pub use router::equipment_router;
pub use service::{EquipmentFilter, InventoryService, RegisterEquipmentRequest};
