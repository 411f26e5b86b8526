use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    AssetTag, AvailabilityStatus, Equipment, EquipmentRegistration, EquipmentType,
};
use super::import::{ImportBatch, ImportSummary, SkippedRow};
use crate::workflows::directory::{Role, User, UserId};
use crate::workflows::error::{ValidationError, WorkflowError};
use crate::workflows::locks::{hold, TransitionLocks};
use crate::workflows::repository::WorkflowRepository;

const INVENTORY_ROLES: [Role; 2] = [Role::BpmStaff, Role::Admin];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterEquipmentRequest {
    pub actor_id: UserId,
    #[serde(flatten)]
    pub registration: EquipmentRegistration,
}

/// Optional filters for listing the register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EquipmentFilter {
    #[serde(default)]
    pub availability: Option<AvailabilityStatus>,
    #[serde(default)]
    pub equipment_type: Option<EquipmentType>,
}

impl EquipmentFilter {
    fn matches(&self, equipment: &Equipment) -> bool {
        self.availability
            .map_or(true, |status| equipment.availability_status == status)
            && self
                .equipment_type
                .map_or(true, |kind| equipment.equipment_type == kind)
    }
}

/// The ICT equipment register outside of loans.
pub struct InventoryService<R> {
    repository: Arc<R>,
    locks: Arc<TransitionLocks>,
}

impl<R> InventoryService<R>
where
    R: WorkflowRepository + 'static,
{
    pub(crate) fn new(repository: Arc<R>, locks: Arc<TransitionLocks>) -> Self {
        Self { repository, locks }
    }

    fn inventory_officer(&self, actor: &UserId, action: &'static str) -> Result<User, WorkflowError> {
        let user = self
            .repository
            .user(actor)?
            .ok_or_else(|| WorkflowError::not_found("user", actor))?;
        if INVENTORY_ROLES.iter().any(|role| user.has_role(*role)) {
            Ok(user)
        } else {
            Err(WorkflowError::not_authorized(actor, action))
        }
    }

    fn insert(
        &self,
        mut registration: EquipmentRegistration,
        by: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Equipment, WorkflowError> {
        registration.asset_tag = registration.asset_tag.normalized();
        if registration.asset_tag.0.is_empty() {
            return Err(ValidationError::MissingField("asset_tag").into());
        }

        let slot = self.locks.slot(&registration.asset_tag.lock_key());
        let _guard = hold(&slot);
        if self.repository.equipment(&registration.asset_tag)?.is_some() {
            return Err(ValidationError::DuplicateAssetTag(registration.asset_tag.0).into());
        }

        Ok(self
            .repository
            .insert_equipment(Equipment::register(registration, by, at))?)
    }

    pub fn register(
        &self,
        request: RegisterEquipmentRequest,
        at: DateTime<Utc>,
    ) -> Result<Equipment, WorkflowError> {
        let actor = self.inventory_officer(&request.actor_id, "register equipment")?;
        let equipment = self.insert(request.registration, &actor.id, at)?;
        info!(
            asset_tag = %equipment.asset_tag,
            equipment_type = equipment.equipment_type.label(),
            "equipment registered"
        );
        Ok(equipment)
    }

    /// Registers every parsed row. Tags already on the register are skipped.
    pub fn import(
        &self,
        batch: ImportBatch,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<ImportSummary, WorkflowError> {
        let actor = self.inventory_officer(actor, "import equipment")?;
        let mut summary = ImportSummary {
            imported: Vec::new(),
            skipped: batch.skipped,
        };

        for parsed in batch.registrations {
            let tag = parsed.registration.asset_tag.0.clone();
            match self.insert(parsed.registration, &actor.id, at) {
                Ok(equipment) => summary.imported.push(equipment.asset_tag),
                Err(WorkflowError::Validation(ValidationError::DuplicateAssetTag(_))) => {
                    summary.skipped.push(SkippedRow {
                        row: parsed.row,
                        asset_tag: tag,
                        reason: "already registered".to_string(),
                    })
                }
                Err(other) => return Err(other),
            }
        }
        summary.skipped.sort_by_key(|skipped| skipped.row);

        info!(
            imported = summary.imported.len(),
            skipped = summary.skipped.len(),
            "equipment import applied"
        );
        if !summary.skipped.is_empty() {
            warn!(skipped = summary.skipped.len(), "equipment import skipped rows");
        }
        Ok(summary)
    }

    pub fn get(&self, tag: &AssetTag) -> Result<Equipment, WorkflowError> {
        let tag = tag.normalized();
        self.repository
            .equipment(&tag)?
            .ok_or_else(|| WorkflowError::not_found("equipment", &tag))
    }

    pub fn list(&self, filter: EquipmentFilter) -> Result<Vec<Equipment>, WorkflowError> {
        let mut equipment: Vec<Equipment> = self
            .repository
            .equipment_list()?
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect();
        equipment.sort_by(|a, b| a.asset_tag.cmp(&b.asset_tag));
        Ok(equipment)
    }

    fn transition<F>(
        &self,
        tag: &AssetTag,
        actor: &UserId,
        action: &'static str,
        at: DateTime<Utc>,
        apply: F,
    ) -> Result<Equipment, WorkflowError>
    where
        F: FnOnce(&mut Equipment) -> Result<(), WorkflowError>,
    {
        let actor = self.inventory_officer(actor, action)?;
        let tag = tag.normalized();
        let slot = self.locks.slot(&tag.lock_key());
        let _guard = hold(&slot);

        let mut equipment = self.get(&tag)?;
        apply(&mut equipment)?;
        equipment.audit.touch(&actor.id, at);
        let equipment = self.repository.update_equipment(equipment)?;
        info!(
            asset_tag = %equipment.asset_tag,
            status = equipment.availability_status.label(),
            officer = %actor.id,
            "equipment status changed"
        );
        Ok(equipment)
    }

    pub fn send_to_maintenance(
        &self,
        tag: &AssetTag,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Equipment, WorkflowError> {
        self.transition(tag, actor, "send equipment to maintenance", at, |equipment| {
            equipment.send_to_maintenance()
        })
    }

    pub fn release_from_maintenance(
        &self,
        tag: &AssetTag,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Equipment, WorkflowError> {
        self.transition(tag, actor, "release equipment from maintenance", at, |equipment| {
            equipment.release_from_maintenance()
        })
    }

    pub fn retire(
        &self,
        tag: &AssetTag,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Equipment, WorkflowError> {
        self.transition(tag, actor, "retire equipment", at, Equipment::retire)
    }
}
