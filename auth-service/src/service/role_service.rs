//! # Role Service
//!
//! Role CRUD plus the one invariant the repository can't enforce on its
//! own: a `parent_id` mutation must never close a cycle in the role DAG.
//! Also owns first-boot seeding of the built-in role set declared in
//! `shared::rbac::registry`.

use std::collections::HashMap;
use std::sync::Arc;

use shared::errors::ApiError;
use shared::rbac::registry;
use shared::rbac::RoleGraph;
use tracing::info;
use uuid::Uuid;

use crate::domain::{NewRole, Role};
use crate::repository::{role_repository, RoleRepository};

#[derive(Clone)]
pub struct RoleService {
    roles: Arc<RoleRepository>,
}

impl RoleService {
    pub fn new(roles: Arc<RoleRepository>) -> Self {
        Self { roles }
    }

    pub async fn create(&self, new_role: NewRole) -> Result<Role, ApiError> {
        if let Some(parent_id) = new_role.parent_id {
            self.roles
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("role:{parent_id}"),
                })?;
        }
        self.roles.create(new_role).await
    }

    pub async fn find(&self, id: Uuid) -> Result<Role, ApiError> {
        self.roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("role:{id}"),
            })
    }

    /// Updates a role, rejecting a `parent_id` change that would introduce
    /// a cycle. Per the concurrency model, the cycle check and the write
    /// share one transaction: the full role set is loaded `FOR UPDATE`
    /// inside it, so a concurrent reparenting elsewhere can't slip a cycle
    /// past a stale snapshot between the check and the commit.
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        permissions: Option<Vec<String>>,
        parent_id: Option<Option<Uuid>>,
    ) -> Result<Role, ApiError> {
        let mut tx = self.roles.pool().begin().await.map_err(ApiError::DatabaseError)?;

        if let Some(Some(proposed_parent)) = parent_id {
            let all = self.roles.list_all_for_update(&mut tx).await?;
            let graph = RoleGraph::new(all.iter().map(role_repository::to_rbac_role).collect());
            if graph.would_create_cycle(id, proposed_parent) {
                return Err(ApiError::Cycle);
            }
        }

        let updated = self
            .roles
            .update_in_transaction(&mut tx, id, name, permissions, parent_id)
            .await?;
        tx.commit().await.map_err(ApiError::DatabaseError)?;
        Ok(updated)
    }

    pub async fn set_disabled(&self, id: Uuid, disabled: bool) -> Result<(), ApiError> {
        self.roles.set_disabled(id, disabled).await
    }

    pub async fn list_all(&self) -> Result<Vec<Role>, ApiError> {
        self.roles.list_all().await
    }

    /// Materializes `shared::rbac::registry::seed_roles()` on first boot.
    /// Idempotent: a role whose name already exists is left untouched, so
    /// this is safe to call on every startup rather than gating it behind a
    /// one-time migration flag.
    ///
    /// `roles.yml` chains parents multiple levels deep (Owner -> Editor ->
    /// Viewer), so a single parentless-then-everyone-else pass isn't
    /// enough — this resolves in rounds, inserting whatever seeds have a
    /// now-known parent each round, until nothing is left or a round makes
    /// no progress (an unresolvable or misspelled `parent` name).
    pub async fn seed_builtin_roles(&self) -> Result<(), ApiError> {
        let mut pending: Vec<_> = registry::seed_roles().iter().collect();
        let mut name_to_id: HashMap<String, Uuid> = HashMap::new();

        for existing in self.roles.list_all().await? {
            name_to_id.insert(existing.name.clone(), existing.id);
        }
        pending.retain(|seed| !name_to_id.contains_key(&seed.name));

        while !pending.is_empty() {
            let mut made_progress = false;
            let mut still_pending = Vec::new();

            for seed in pending {
                let parent_id = match &seed.parent_name {
                    None => None,
                    Some(parent_name) => match name_to_id.get(parent_name) {
                        Some(id) => Some(*id),
                        None => {
                            still_pending.push(seed);
                            continue;
                        }
                    },
                };

                let created = self
                    .roles
                    .create(NewRole {
                        name: seed.name.clone(),
                        permissions: seed.permissions.iter().map(|p| p.as_str().to_string()).collect(),
                        parent_id,
                    })
                    .await?;
                info!(role = %created.name, "seeded built-in role");
                name_to_id.insert(created.name, created.id);
                made_progress = true;
            }

            if !made_progress {
                let names: Vec<_> = still_pending.iter().map(|s| s.name.as_str()).collect();
                return Err(ApiError::InternalError {
                    message: format!("seed roles reference unresolvable parents: {names:?}"),
                });
            }
            pending = still_pending;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_roles_resolve_against_registry() {
        let seeds = registry::seed_roles();
        assert!(!seeds.is_empty());
    }
}
