//! Domain entities for authenticated callers.

use chrono::{DateTime, Utc};

/// A provisioned gateway user, as stored in the `users` table.
///
/// Created by external provisioning (or the migration tool's seed data);
/// mutated only through the admin endpoint; never deleted by the core.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub quota: f64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A quota of zero is treated identically to an absent/unknown user —
    /// it is never a valid authenticated caller in this system.
    pub fn has_valid_quota(&self) -> bool {
        self.quota > 0.0
    }
}
