//! Replication topology roles (§4.6 "Roles").

/// A node's position in the replication topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepts writes locally and broadcasts them to followers.
    Primary,
    /// Applies mutations received through the replication channel; must
    /// reject writes arriving through its own public write API.
    Replica,
}

impl Role {
    pub fn is_primary(self) -> bool {
        matches!(self, Role::Primary)
    }

    pub fn is_replica(self) -> bool {
        matches!(self, Role::Replica)
    }
}
