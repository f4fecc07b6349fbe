// =============================================================================
// PERMISSION MODULE
// =============================================================================
// Centralised access control: may the acting principal perform an operation
// on a resource category?
//
// NOTES:
// - Resources and operations are closed enumerations, never free strings
// - Evaluation is a pure function of (group rule table, resource, operation)
// - Unset rules deny (fail-closed)
// =============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::user::Principal;
use crate::error::{AppError, AppResult};

// =============================================================================
// RESOURCE CATEGORIES
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Parts,
    PartsName,
    PartsDescription,
    PartsInstock,
    PartsMininstock,
    PartsFootprint,
    PartsComment,
    PartsOrder,
    PartsOrderdetails,
    PartsAttachments,
    DeviceParts,
    Categories,
    Footprints,
    StoreLocations,
    Manufacturers,
    Suppliers,
    Devices,
    AttachmentTypes,
    Users,
    Groups,
}

impl Resource {
    pub const ALL: [Resource; 20] = [
        Resource::Parts,
        Resource::PartsName,
        Resource::PartsDescription,
        Resource::PartsInstock,
        Resource::PartsMininstock,
        Resource::PartsFootprint,
        Resource::PartsComment,
        Resource::PartsOrder,
        Resource::PartsOrderdetails,
        Resource::PartsAttachments,
        Resource::DeviceParts,
        Resource::Categories,
        Resource::Footprints,
        Resource::StoreLocations,
        Resource::Manufacturers,
        Resource::Suppliers,
        Resource::Devices,
        Resource::AttachmentTypes,
        Resource::Users,
        Resource::Groups,
    ];

    /// Name used in the `group_permissions` table and in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Parts => "parts",
            Resource::PartsName => "parts_name",
            Resource::PartsDescription => "parts_description",
            Resource::PartsInstock => "parts_instock",
            Resource::PartsMininstock => "parts_mininstock",
            Resource::PartsFootprint => "parts_footprint",
            Resource::PartsComment => "parts_comment",
            Resource::PartsOrder => "parts_order",
            Resource::PartsOrderdetails => "parts_orderdetails",
            Resource::PartsAttachments => "parts_attachments",
            Resource::DeviceParts => "device_parts",
            Resource::Categories => "categories",
            Resource::Footprints => "footprints",
            Resource::StoreLocations => "storelocations",
            Resource::Manufacturers => "manufacturers",
            Resource::Suppliers => "suppliers",
            Resource::Devices => "devices",
            Resource::AttachmentTypes => "attachement_types",
            Resource::Users => "users",
            Resource::Groups => "groups",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == value)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Create,
    Edit,
    Delete,
    Move,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Read,
        Operation::Create,
        Operation::Edit,
        Operation::Delete,
        Operation::Move,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Edit => "edit",
            Operation::Delete => "delete",
            Operation::Move => "move",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == value)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RULE TABLE
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Allow,
    Deny,
}

/// One stored row of the `group_permissions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub group_id: i64,
    pub resource: Resource,
    pub operation: Operation,
    pub allowed: bool,
}

/// The rule table of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionTable {
    rules: BTreeMap<(Resource, Operation), Rule>,
}

impl PermissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from stored rows. Later rows win on duplicates.
    pub fn from_rules<'a>(rows: impl IntoIterator<Item = &'a PermissionRule>) -> Self {
        let mut table = Self::new();
        for row in rows {
            let rule = if row.allowed { Rule::Allow } else { Rule::Deny };
            table.set(row.resource, row.operation, rule);
        }
        table
    }

    pub fn set(&mut self, resource: Resource, operation: Operation, rule: Rule) {
        self.rules.insert((resource, operation), rule);
    }

    /// Builder-style `set`, handy for fixtures.
    pub fn with(mut self, resource: Resource, operation: Operation, rule: Rule) -> Self {
        self.set(resource, operation, rule);
        self
    }

    pub fn rule(&self, resource: Resource, operation: Operation) -> Option<Rule> {
        self.rules.get(&(resource, operation)).copied()
    }

    /// Unset means deny.
    pub fn allows(&self, resource: Resource, operation: Operation) -> bool {
        matches!(self.rule(resource, operation), Some(Rule::Allow))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// =============================================================================
// PERMISSION MANAGER
// =============================================================================
pub struct PermissionManager;

impl PermissionManager {
    /// May `principal` perform `operation` on `resource`?
    pub fn can(principal: &Principal, resource: Resource, operation: Operation) -> bool {
        principal.group.permissions.allows(resource, operation)
    }

    /// Like [`PermissionManager::can`], but fails with `PermissionDenied`.
    pub fn require(
        principal: &Principal,
        resource: Resource,
        operation: Operation,
    ) -> AppResult<()> {
        if Self::can(principal, resource, operation) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied {
                resource,
                operation,
            })
        }
    }
}
