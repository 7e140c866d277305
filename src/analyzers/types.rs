//! Data types used by the aggregation and ranking pipeline.

use serde::{Deserialize, Serialize};

use crate::analyzers::palette::Color;

/// Direction of a contribution to an entity's total.
///
/// Boarding/alighting for subway stations, rent/return for bike stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Outbound,
    Inbound,
}

/// Which columns feed one role: the entity label and the measure summed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleColumns {
    pub role: Role,
    pub entity_column: String,
    pub measure_column: String,
}

impl RoleColumns {
    pub fn new(role: Role, entity_column: &str, measure_column: &str) -> Self {
        Self {
            role,
            entity_column: entity_column.to_string(),
            measure_column: measure_column.to_string(),
        }
    }
}

/// The summed measure of one entity in one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionalCount {
    pub entity: String,
    pub role: Role,
    pub total: u64,
    /// Distinct categories of the contributing records, first-seen order.
    #[serde(skip)]
    pub categories: Vec<String>,
}

/// Per-entity totals after merging every role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityTotal {
    pub entity: String,
    pub outbound: u64,
    pub inbound: u64,
    pub combined: u64,
    #[serde(skip)]
    pub categories: Vec<String>,
}

impl EntityTotal {
    pub(crate) fn empty(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            outbound: 0,
            inbound: 0,
            combined: 0,
            categories: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, role: Role, amount: u64) {
        match role {
            Role::Outbound => self.outbound += amount,
            Role::Inbound => self.inbound += amount,
        }
        self.combined = self.outbound + self.inbound;
    }
}

/// An [`EntityTotal`] with its position in the ranking and its bar color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    /// 1-based rank.
    pub rank: usize,
    pub total: EntityTotal,
    pub color: Color,
}

impl RankedEntry {
    pub fn entity(&self) -> &str {
        &self.total.entity
    }

    pub fn combined(&self) -> u64 {
        self.total.combined
    }
}
