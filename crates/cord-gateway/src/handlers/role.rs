//! GUILD_ROLE_CREATE / UPDATE / DELETE

use async_trait::async_trait;
use cord_core::payloads::{RoleDeletePayload, RoleEventPayload};
use cord_core::{DomainError, Event, Role};
use serde_json::Value;

use super::{parse, HandlerContext, HandlerResult, PacketHandler};

/// Insert or update a role; `None` if its server is not cached
fn upsert_role(ctx: &HandlerContext, payload: &RoleEventPayload) -> HandlerResult<Option<(Role, Option<Role>)>> {
    let role = Role::from_payload(payload.guild_id, &payload.role);
    match ctx.cache().insert_role(role.clone()) {
        Ok(previous) => Ok(Some((role, previous))),
        Err(DomainError::UnknownServer(id)) => {
            tracing::debug!(server_id = %id, role_id = %payload.role.id, "Role event for uncached server");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub struct RoleCreateHandler;

#[async_trait]
impl PacketHandler for RoleCreateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let event: RoleEventPayload = parse(payload)?;
        Ok(match upsert_role(ctx, &event)? {
            Some((role, None)) => vec![Event::RoleCreate {
                server_id: role.server_id,
                role_id: role.id,
            }],
            _ => Vec::new(),
        })
    }
}

/// A role the cache has not seen yet is reported as created
pub struct RoleUpdateHandler;

#[async_trait]
impl PacketHandler for RoleUpdateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let event: RoleEventPayload = parse(payload)?;
        let Some((role, previous)) = upsert_role(ctx, &event)? else {
            return Ok(Vec::new());
        };
        let server_id = role.server_id;
        let role_id = role.id;
        Ok(match previous {
            None => vec![Event::RoleCreate { server_id, role_id }],
            Some(old) => {
                let mut compared = old.clone();
                compared.member_ids.clear();
                if compared == role {
                    Vec::new()
                } else {
                    // The cached role keeps its member index
                    let new = ctx.cache().role(role_id).unwrap_or(role);
                    vec![Event::RoleUpdate { old, new }]
                }
            }
        })
    }
}

pub struct RoleDeleteHandler;

#[async_trait]
impl PacketHandler for RoleDeleteHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let event: RoleDeletePayload = parse(payload)?;
        Ok(match ctx.cache().remove_role(event.role_id) {
            Some(role) => vec![Event::RoleDelete { role }],
            None => Vec::new(),
        })
    }
}
