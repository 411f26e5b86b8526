use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::directory::UserId;

/// Who created and last touched a record, filled in by the calling service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_by: UserId,
    pub updated_at: DateTime<Utc>,
}

impl AuditFields {
    pub fn new(by: &UserId, at: DateTime<Utc>) -> Self {
        Self {
            created_by: by.clone(),
            created_at: at,
            updated_by: by.clone(),
            updated_at: at,
        }
    }

    pub fn touch(&mut self, by: &UserId, at: DateTime<Utc>) {
        self.updated_by = by.clone();
        self.updated_at = at;
    }
}
