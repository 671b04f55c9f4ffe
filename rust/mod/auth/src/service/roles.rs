use tracing::info;

use garment_core::{ensure_not_blank, now_rfc3339, ListParams, ListResult, ServiceError};
use garment_store::{begin, commit, storage_err, table, Executor, Value};

use crate::model::{CreateRole, Role, UpdateRole};
use crate::schema::{GRANTS, ROLES};
use crate::service::AuthService;
use crate::ROOT_ROLE;

struct BuiltinRole {
    id: &'static str,
    description: &'static str,
    permissions: &'static [&'static str],
}

const BUILTIN_ROLES: &[BuiltinRole] = &[
    BuiltinRole { id: ROOT_ROLE, description: "Superuser, bypasses every permission check", permissions: &["*"] },
    BuiltinRole {
        id: "sales:manager",
        description: "Runs the sales desk",
        permissions: &["sales:*", "inventory:item:read", "inventory:stock:read", "shipment:shipment:read"],
    },
    BuiltinRole {
        id: "sales:clerk",
        description: "Enters customers and orders",
        permissions: &[
            "sales:customer:read",
            "sales:customer:create",
            "sales:customer:update",
            "sales:order:read",
            "sales:order:create",
            "sales:order:update",
            "inventory:item:read",
        ],
    },
    BuiltinRole {
        id: "procurement:manager",
        description: "Approves purchasing and goods receipts",
        permissions: &["procurement:*", "inventory:item:read", "inventory:stock:read"],
    },
    BuiltinRole {
        id: "procurement:clerk",
        description: "Raises purchase orders and books receipts",
        permissions: &[
            "procurement:vendor:read",
            "procurement:purchase_order:read",
            "procurement:purchase_order:create",
            "procurement:purchase_order:update",
            "procurement:grn:read",
            "procurement:grn:create",
            "procurement:grn:receive",
            "procurement:grn:verify",
            "procurement:vendor_request:read",
            "inventory:item:read",
        ],
    },
    BuiltinRole {
        id: "inventory:manager",
        description: "Owns the store and its ledger",
        permissions: &["inventory:*", "manufacturing:mrn:read"],
    },
    BuiltinRole {
        id: "inventory:clerk",
        description: "Issues material against requests",
        permissions: &["inventory:item:read", "inventory:stock:read", "inventory:mrn:dispatch", "manufacturing:mrn:read"],
    },
    BuiltinRole {
        id: "manufacturing:manager",
        description: "Plans and runs production",
        permissions: &[
            "manufacturing:*",
            "inventory:item:read",
            "inventory:stock:read",
            "sales:order:read",
            "procurement:vendor:read",
        ],
    },
    BuiltinRole {
        id: "manufacturing:clerk",
        description: "Requests material and records stage output",
        permissions: &[
            "manufacturing:production_order:read",
            "manufacturing:stage:read",
            "manufacturing:stage:update",
            "manufacturing:mrn:read",
            "manufacturing:mrn:create",
            "manufacturing:mrn:receive",
            "inventory:item:read",
        ],
    },
    BuiltinRole {
        id: "shipment:manager",
        description: "Owns outbound logistics",
        permissions: &["shipment:*", "sales:order:read", "inventory:stock:read"],
    },
    BuiltinRole {
        id: "shipment:clerk",
        description: "Packs and hands over shipments",
        permissions: &["shipment:shipment:read", "shipment:shipment:create", "shipment:shipment:update", "sales:order:read"],
    },
    BuiltinRole {
        id: "finance:manager",
        description: "Issues and applies credit notes",
        permissions: &[
            "finance:*",
            "procurement:vendor_request:read",
            "procurement:purchase_order:read",
            "sales:order:read",
        ],
    },
    BuiltinRole {
        id: "finance:clerk",
        description: "Drafts credit notes",
        permissions: &["finance:credit_note:read", "finance:credit_note:create", "finance:summary:read"],
    },
];

/// Insert any built-in role that is missing. Existing rows, including
/// edited built-ins, are left as they are.
pub fn seed_builtin_roles<E>(db: &E) -> Result<usize, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut created = 0;
    for b in BUILTIN_ROLES {
        if table::find::<_, Role>(db, ROLES, b.id)?.is_some() {
            continue;
        }
        let now = now_rfc3339();
        let role = Role {
            id: b.id.to_string(),
            description: Some(b.description.to_string()),
            permissions: b.permissions.iter().map(|p| p.to_string()).collect(),
            builtin: true,
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(db, ROLES, &role.id, &role, &[("builtin", Value::Integer(1))])?;
        created += 1;
    }
    if created > 0 {
        info!(created, "seeded built-in roles");
    }
    Ok(created)
}

impl AuthService {
    pub fn create_role(&self, input: CreateRole) -> Result<Role, ServiceError> {
        check_role_id(&input.id)?;
        check_permissions(&input.permissions)?;
        let now = now_rfc3339();
        let role = Role {
            id: input.id,
            description: input.description,
            permissions: input.permissions,
            builtin: false,
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(self.db.as_ref(), ROLES, &role.id, &role, &[("builtin", Value::Integer(0))])?;
        info!(role = %role.id, "role created");
        Ok(role)
    }

    pub fn get_role(&self, id: &str) -> Result<Role, ServiceError> {
        table::get(self.db.as_ref(), ROLES, id)
    }

    pub fn list_roles(&self, params: &ListParams) -> Result<ListResult<Role>, ServiceError> {
        table::list(self.db.as_ref(), ROLES, &[], &["id"], params)
    }

    pub fn update_role(&self, id: &str, input: UpdateRole) -> Result<Role, ServiceError> {
        if id == ROOT_ROLE {
            return Err(ServiceError::ReadOnly(format!("role {ROOT_ROLE} cannot be changed")));
        }
        let mut role: Role = table::get(self.db.as_ref(), ROLES, id)?;
        if let Some(desc) = input.description {
            role.description = Some(desc);
        }
        if let Some(perms) = input.permissions {
            check_permissions(&perms)?;
            role.permissions = perms;
        }
        role.updated_at = now_rfc3339();
        table::update(self.db.as_ref(), ROLES, &role.id, &role, &[])?;
        info!(role = %role.id, "role updated");
        Ok(role)
    }

    /// Delete a role together with every grant of it.
    pub fn delete_role(&self, id: &str) -> Result<(), ServiceError> {
        if id == ROOT_ROLE {
            return Err(ServiceError::ReadOnly(format!("role {ROOT_ROLE} cannot be deleted")));
        }
        let tx = begin(self.db.as_ref())?;
        table::delete(&*tx, ROLES, id)?;
        let revoked = tx
            .exec(&format!("DELETE FROM {GRANTS} WHERE role_id = ?1"), &[Value::Text(id.to_string())])
            .map_err(storage_err)?;
        commit(tx)?;
        info!(role = id, revoked, "role deleted");
        Ok(())
    }
}

fn check_role_id(id: &str) -> Result<(), ServiceError> {
    let segments: Vec<&str> = id.split(':').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.trim().is_empty() || s.contains(char::is_whitespace)) {
        return Err(ServiceError::Validation(format!(
            "role id '{id}' must look like module:name"
        )));
    }
    Ok(())
}

fn check_permissions(perms: &[String]) -> Result<(), ServiceError> {
    if perms.is_empty() {
        return Err(ServiceError::Validation("a role needs at least one permission".into()));
    }
    for p in perms {
        ensure_not_blank("permission", p)?;
        if p.split(':').any(|seg| seg.is_empty()) {
            return Err(ServiceError::Validation(format!("malformed permission '{p}'")));
        }
    }
    Ok(())
}
