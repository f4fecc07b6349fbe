// =============================================================================
// USERS, GROUPS AND THE ACTING PRINCIPAL
// =============================================================================
// Every user belongs to one group; the group's rule table decides what the
// user may do (see permission.rs). Authentication is handled elsewhere; this
// module only resolves an already identified user id.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::permission::PermissionTable;
use crate::store::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub group_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: i64,
    pub name: String,
}

/// A group with its loaded rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub permissions: PermissionTable,
}

/// The acting user of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: UserRecord,
    pub group: Group,
}

impl Principal {
    /// Resolves a user id into a principal with its group's rule table.
    pub async fn load(store: &dyn Storage, user_id: i64) -> AppResult<Self> {
        let user = store
            .fetch_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User", user_id))?;
        let group = store
            .fetch_group(user.group_id)
            .await?
            .ok_or_else(|| AppError::not_found("Group", user.group_id))?;
        let rules = store.fetch_group_rules(group.id).await?;

        Ok(Self {
            group: Group {
                id: group.id,
                name: group.name,
                permissions: PermissionTable::from_rules(&rules),
            },
            user,
        })
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    /// "First Last", falling back to the login name
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.user.first_name, self.user.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.user.name.clone()
        } else {
            full.to_string()
        }
    }
}
