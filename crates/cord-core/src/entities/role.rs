//! Role entity - a server role with permissions and its member set

use std::collections::HashSet;

use crate::payloads::RolePayload;
use crate::value_objects::{Permissions, Snowflake};

/// Role entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: Snowflake,
    pub server_id: Snowflake,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub position: i32,
    pub permissions: Permissions,
    pub managed: bool,
    pub mentionable: bool,
    /// Users holding this role
    pub member_ids: HashSet<Snowflake>,
}

impl Role {
    pub fn from_payload(server_id: Snowflake, payload: &RolePayload) -> Self {
        Self {
            id: payload.id,
            server_id,
            name: payload.name.clone(),
            color: payload.color,
            hoist: payload.hoist,
            position: payload.position,
            permissions: payload.permissions,
            managed: payload.managed,
            mentionable: payload.mentionable,
            member_ids: HashSet::new(),
        }
    }

    /// Update attributes from a payload; the member set is kept
    pub fn apply(&mut self, payload: &RolePayload) {
        self.name.clone_from(&payload.name);
        self.color = payload.color;
        self.hoist = payload.hoist;
        self.position = payload.position;
        self.permissions = payload.permissions;
        self.managed = payload.managed;
        self.mentionable = payload.mentionable;
    }

    /// The @everyone role shares its id with the server
    #[inline]
    pub fn is_everyone(&self) -> bool {
        self.id == self.server_id
    }

    /// Mention string; @everyone has no `<@&id>` form
    pub fn mention_tag(&self) -> String {
        if self.is_everyone() {
            "@everyone".to_string()
        } else {
            format!("<@&{}>", self.id)
        }
    }

    /// Hierarchy comparison: higher position wins, ties go to the lower id
    pub fn is_higher_than(&self, other: &Role) -> bool {
        (self.position, std::cmp::Reverse(self.id)) > (other.position, std::cmp::Reverse(other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(id: u64, position: i32) -> RolePayload {
        RolePayload {
            id: Snowflake::new(id),
            name: format!("role-{id}"),
            color: 0,
            hoist: false,
            position,
            permissions: Permissions::SEND_MESSAGES,
            managed: false,
            mentionable: true,
        }
    }

    #[test]
    fn test_everyone_role() {
        let server = Snowflake::new(10);
        let everyone = Role::from_payload(server, &payload(10, 0));
        assert!(everyone.is_everyone());
        assert_eq!(everyone.mention_tag(), "@everyone");

        let other = Role::from_payload(server, &payload(11, 1));
        assert!(!other.is_everyone());
        assert_eq!(other.mention_tag(), "<@&11>");
    }

    #[test]
    fn test_apply_keeps_members() {
        let mut role = Role::from_payload(Snowflake::new(10), &payload(11, 1));
        role.member_ids.insert(Snowflake::new(5));

        let mut update = payload(11, 3);
        update.name = "mods".to_string();
        role.apply(&update);

        assert_eq!(role.name, "mods");
        assert_eq!(role.position, 3);
        assert!(role.member_ids.contains(&Snowflake::new(5)));
    }

    #[test]
    fn test_hierarchy() {
        let server = Snowflake::new(10);
        let low = Role::from_payload(server, &payload(20, 1));
        let high = Role::from_payload(server, &payload(21, 2));
        assert!(high.is_higher_than(&low));
        assert!(!low.is_higher_than(&high));

        let tie = Role::from_payload(server, &payload(30, 1));
        assert!(low.is_higher_than(&tie));
    }
}
