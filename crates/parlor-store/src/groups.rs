use chrono::{DateTime, Utc};
use parlor_shared::{GroupId, UserId};
use rusqlite::params;

use crate::convert::{get_id, get_opt_ts, get_ts, opt_ts, ts};
use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::members::insert_member_row;
use crate::models::{Group, GroupMember};

const GROUP_COLUMNS: &str =
    "id, name, description, avatar, creator_id, created_at, updated_at, deleted_at";

impl Database {
    /// Insert a group together with its initial member set in one
    /// transaction.
    pub fn create_group(&mut self, group: &Group, members: &[GroupMember]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "INSERT INTO groups (id, name, description, avatar, creator_id, created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                group.id.to_string(),
                group.name,
                group.description,
                group.avatar,
                group.creator_id.to_string(),
                ts(&group.created_at),
                ts(&group.updated_at),
                opt_ts(&group.deleted_at),
            ],
        )?;
        for member in members {
            insert_member_row(&tx, member)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetch a group regardless of its soft-delete state.
    pub fn get_group(&self, id: GroupId) -> Result<Group> {
        self.conn()
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?1"),
                params![id.to_string()],
                row_to_group,
            )
            .map_err(not_found)
    }

    /// Live groups where `user_id` is an active member, most recently
    /// updated first.
    pub fn list_groups_for_member(&self, user_id: UserId) -> Result<Vec<Group>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.name, g.description, g.avatar, g.creator_id,
                    g.created_at, g.updated_at, g.deleted_at
             FROM groups g
             JOIN group_members m ON m.group_id = g.id
             WHERE m.user_id = ?1 AND m.left_at IS NULL AND g.deleted_at IS NULL
             ORDER BY g.updated_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], row_to_group)?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    /// Persist name, description, avatar and `updated_at`.
    pub fn update_group_details(&self, group: &Group) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE groups SET name = ?2, description = ?3, avatar = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                group.id.to_string(),
                group.name,
                group.description,
                group.avatar,
                ts(&group.updated_at),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Returns `false` if the group was already soft-deleted.
    pub fn soft_delete_group(&self, id: GroupId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE groups SET deleted_at = ?2, updated_at = ?2
             WHERE id = ?1 AND deleted_at IS NULL",
            params![id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }

    /// Returns `false` if the group was not soft-deleted.
    pub fn restore_group(&self, id: GroupId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE groups SET deleted_at = NULL, updated_at = ?2
             WHERE id = ?1 AND deleted_at IS NOT NULL",
            params![id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }

    /// Irreversibly remove a group. Memberships, messages and their read
    /// receipts go with it.
    pub fn hard_delete_group(&self, id: GroupId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM groups WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: get_id(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        avatar: row.get(3)?,
        creator_id: get_id(row, 4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
        deleted_at: get_opt_ts(row, 7)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::convert::now;
    use parlor_shared::GroupRole;

    /// Create a live group owned by `admin` with the given plain members.
    pub(crate) fn seed_group(db: &mut Database, admin: UserId, members: &[UserId]) -> Group {
        let at = now();
        let group = Group {
            id: GroupId::new(),
            name: "ops".into(),
            description: None,
            avatar: None,
            creator_id: admin,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        };
        let mut rows = vec![GroupMember::new(group.id, admin, GroupRole::Admin, at)];
        rows.extend(
            members
                .iter()
                .map(|m| GroupMember::new(group.id, *m, GroupRole::Member, at)),
        );
        db.create_group(&group, &rows).unwrap();
        group
    }

    #[test]
    fn create_and_fetch_group() {
        let mut db = Database::open_in_memory().unwrap();
        let admin = UserId::new();
        let member = UserId::new();
        let group = seed_group(&mut db, admin, &[member]);

        assert_eq!(db.get_group(group.id).unwrap(), group);
        assert_eq!(db.list_members(group.id).unwrap().len(), 2);
        assert_eq!(db.list_groups_for_member(member).unwrap(), vec![group]);
    }

    #[test]
    fn missing_group_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_group(GroupId::new()), Err(StoreError::NotFound)));
    }

    #[test]
    fn soft_delete_hides_from_listing_and_restore_brings_back() {
        let mut db = Database::open_in_memory().unwrap();
        let admin = UserId::new();
        let group = seed_group(&mut db, admin, &[]);

        assert!(db.soft_delete_group(group.id, now()).unwrap());
        assert!(!db.soft_delete_group(group.id, now()).unwrap());
        assert!(db.get_group(group.id).unwrap().is_deleted());
        assert!(db.list_groups_for_member(admin).unwrap().is_empty());

        assert!(db.restore_group(group.id, now()).unwrap());
        assert!(!db.restore_group(group.id, now()).unwrap());
        assert_eq!(db.list_groups_for_member(admin).unwrap().len(), 1);
    }

    #[test]
    fn update_details_persists() {
        let mut db = Database::open_in_memory().unwrap();
        let mut group = seed_group(&mut db, UserId::new(), &[]);
        group.name = "renamed".into();
        group.description = Some("about".into());
        group.updated_at = now();
        db.update_group_details(&group).unwrap();
        assert_eq!(db.get_group(group.id).unwrap(), group);
    }

    #[test]
    fn hard_delete_cascades_memberships() {
        let mut db = Database::open_in_memory().unwrap();
        let admin = UserId::new();
        let group = seed_group(&mut db, admin, &[UserId::new()]);

        assert!(db.hard_delete_group(group.id).unwrap());
        assert!(db.list_members(group.id).unwrap().is_empty());
        assert!(!db.hard_delete_group(group.id).unwrap());
    }
}
