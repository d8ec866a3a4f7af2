//! Permission contract consumed by the gateway, plus a table-rule policy.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;

use crate::types::{Identity, Operation, RecordId};

/// Column holding the owning identity when a rule does not name one
pub const DEFAULT_OWNER_COLUMN: &str = "user";

/// Restriction on which rows an operation may see or affect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowScope {
    Unrestricted,
    Owner { column: String, identity: RecordId },
}

impl RowScope {
    /// Where-language conditions enforcing this scope
    pub fn conditions(&self) -> Option<Value> {
        match self {
            RowScope::Unrestricted => None,
            RowScope::Owner { column, identity } => Some(json!({ column.as_str(): identity })),
        }
    }

    pub fn owner_column(&self) -> Option<&str> {
        match self {
            RowScope::Unrestricted => None,
            RowScope::Owner { column, .. } => Some(column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub row_scope: RowScope,
    pub denied_reason: Option<String>,
    /// Columns stripped from every row read under this decision and refused in caller filters
    pub read_blacklist: Vec<String>,
    /// Columns a write under this decision may not name
    pub write_blacklist: Vec<String>,
}

impl PermissionDecision {
    pub fn unrestricted() -> Self {
        Self {
            allowed: true,
            row_scope: RowScope::Unrestricted,
            denied_reason: None,
            read_blacklist: vec![],
            write_blacklist: vec![],
        }
    }

    pub fn owned(column: impl Into<String>, identity: RecordId) -> Self {
        Self {
            row_scope: RowScope::Owner { column: column.into(), identity },
            ..Self::unrestricted()
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            denied_reason: Some(reason.into()),
            ..Self::unrestricted()
        }
    }
}

/// Decides whether `identity` may perform `operation` on `table`.
/// Must return the same decision for the same inputs within one request.
pub trait PermissionFilter: Send + Sync {
    fn resolve(&self, identity: &Identity, table: &str, operation: Operation) -> PermissionDecision;
}

/// Access level granted by a rule for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    None,
    Own,
    All,
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "deny" => Ok(Access::None),
            "own" | "mine" => Ok(Access::Own),
            "all" | "full" => Ok(Access::All),
            other => Err(format!("unknown access level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRule {
    pub read: Access,
    pub create: Access,
    pub update: Access,
    pub delete: Access,
    pub owner_column: String,
    pub read_blacklist: Vec<String>,
    pub write_blacklist: Vec<String>,
}

impl TableRule {
    pub fn uniform(access: Access) -> Self {
        Self {
            read: access,
            create: access,
            update: access,
            delete: access,
            owner_column: DEFAULT_OWNER_COLUMN.to_string(),
            read_blacklist: vec![],
            write_blacklist: vec![],
        }
    }

    pub fn owner_column(mut self, column: impl Into<String>) -> Self {
        self.owner_column = column.into();
        self
    }

    pub fn with_access(mut self, operation: Operation, access: Access) -> Self {
        match operation {
            Operation::Read => self.read = access,
            Operation::Create => self.create = access,
            Operation::Update => self.update = access,
            Operation::Delete => self.delete = access,
        }
        self
    }

    pub fn hide_columns(mut self, columns: &[&str]) -> Self {
        self.read_blacklist = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn lock_columns(mut self, columns: &[&str]) -> Self {
        self.write_blacklist = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn access(&self, operation: Operation) -> Access {
        match operation {
            Operation::Read => self.read,
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// In-process policy: a rule per table, a default rule for the rest.
/// Admin identities are unrestricted everywhere.
#[derive(Debug, Clone)]
pub struct AclPolicy {
    default_rule: TableRule,
    tables: HashMap<String, TableRule>,
}

impl AclPolicy {
    pub fn new(default_rule: TableRule) -> Self {
        Self { default_rule, tables: HashMap::new() }
    }

    pub fn with_table(mut self, table: impl Into<String>, rule: TableRule) -> Self {
        self.tables.insert(table.into(), rule);
        self
    }

    /// Default policy: owned system resources, configurable access elsewhere,
    /// schema changes reserved for admins.
    pub fn from_config(config: &crate::config::AclConfig) -> Self {
        Self::new(TableRule::uniform(config.default_access))
            .with_table(crate::database::schema::BOOKMARKS_TABLE, TableRule::uniform(Access::Own))
            .with_table(crate::database::schema::PREFERENCES_TABLE, TableRule::uniform(Access::Own))
            .with_table(crate::database::schema::COLUMNS_TABLE, TableRule::uniform(Access::None))
    }
}

impl PermissionFilter for AclPolicy {
    fn resolve(&self, identity: &Identity, table: &str, operation: Operation) -> PermissionDecision {
        if identity.admin {
            return PermissionDecision::unrestricted();
        }

        let rule = self.tables.get(table).unwrap_or(&self.default_rule);
        let mut decision = match rule.access(operation) {
            Access::None => {
                return PermissionDecision::deny(format!("{} on '{}' is not permitted", operation, table))
            }
            Access::Own => PermissionDecision::owned(rule.owner_column.clone(), identity.id),
            Access::All => PermissionDecision::unrestricted(),
        };
        decision.read_blacklist = rule.read_blacklist.clone();
        decision.write_blacklist = rule.write_blacklist.clone();
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AclPolicy {
        AclPolicy::new(TableRule::uniform(Access::None))
            .with_table("notes", TableRule::uniform(Access::Own).with_access(Operation::Read, Access::All))
            .with_table(
                "profiles",
                TableRule::uniform(Access::Own)
                    .owner_column("account")
                    .hide_columns(&["password"])
                    .lock_columns(&["role"]),
            )
    }

    #[test]
    fn unknown_tables_fall_back_to_default_rule() {
        let decision = policy().resolve(&Identity::user(1), "secrets", Operation::Read);
        assert!(!decision.allowed);
        assert_eq!(decision.denied_reason.as_deref(), Some("read on 'secrets' is not permitted"));
    }

    #[test]
    fn owned_access_binds_scope_to_identity() {
        let decision = policy().resolve(&Identity::user(5), "notes", Operation::Delete);
        assert!(decision.allowed);
        assert_eq!(
            decision.row_scope,
            RowScope::Owner { column: "user".into(), identity: 5 }
        );
        assert_eq!(decision.row_scope.conditions(), Some(json!({ "user": 5 })));

        let read = policy().resolve(&Identity::user(5), "notes", Operation::Read);
        assert_eq!(read.row_scope, RowScope::Unrestricted);
        assert_eq!(read.row_scope.conditions(), None);
    }

    #[test]
    fn column_restrictions_travel_with_the_decision() {
        let decision = policy().resolve(&Identity::user(2), "profiles", Operation::Update);
        assert_eq!(decision.row_scope.owner_column(), Some("account"));
        assert_eq!(decision.read_blacklist, vec!["password".to_string()]);
        assert_eq!(decision.write_blacklist, vec!["role".to_string()]);
    }

    #[test]
    fn admins_are_unrestricted() {
        let decision = policy().resolve(&Identity::admin(1), "secrets", Operation::Delete);
        assert_eq!(decision, PermissionDecision::unrestricted());
    }

    #[test]
    fn decisions_are_deterministic() {
        let p = policy();
        let identity = Identity::user(9);
        assert_eq!(
            p.resolve(&identity, "notes", Operation::Update),
            p.resolve(&identity, "notes", Operation::Update)
        );
    }

    #[test]
    fn parses_access_levels() {
        assert_eq!("own".parse::<Access>().unwrap(), Access::Own);
        assert_eq!("ALL".parse::<Access>().unwrap(), Access::All);
        assert!("sometimes".parse::<Access>().is_err());
    }
}
