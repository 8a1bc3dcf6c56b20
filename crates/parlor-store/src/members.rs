use chrono::{DateTime, Utc};
use parlor_shared::{GroupId, GroupRole, UserId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::convert::{count, get_id, get_opt_ts, get_parsed, get_ts, opt_ts, ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::GroupMember;

const MEMBER_COLUMNS: &str = "group_id, user_id, role, joined_at, left_at";

pub(crate) fn insert_member_row(conn: &Connection, member: &GroupMember) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO group_members (group_id, user_id, role, joined_at, left_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            member.group_id.to_string(),
            member.user_id.to_string(),
            member.role.as_str(),
            ts(&member.joined_at),
            opt_ts(&member.left_at),
        ],
    )?;
    Ok(())
}

impl Database {
    /// Membership row for `(group_id, user_id)`, active or left.
    pub fn get_member(&self, group_id: GroupId, user_id: UserId) -> Result<Option<GroupMember>> {
        let member = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {MEMBER_COLUMNS} FROM group_members
                     WHERE group_id = ?1 AND user_id = ?2"
                ),
                params![group_id.to_string(), user_id.to_string()],
                row_to_member,
            )
            .optional()?;
        Ok(member)
    }

    /// Every membership row of a group, in join order.
    pub fn list_members(&self, group_id: GroupId) -> Result<Vec<GroupMember>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM group_members
             WHERE group_id = ?1
             ORDER BY joined_at ASC, user_id ASC"
        ))?;

        let rows = stmt.query_map(params![group_id.to_string()], row_to_member)?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    pub fn active_member_ids(&self, group_id: GroupId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_id FROM group_members
             WHERE group_id = ?1 AND left_at IS NULL
             ORDER BY joined_at ASC, user_id ASC",
        )?;

        let rows = stmt.query_map(params![group_id.to_string()], |row| get_id(row, 0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Live groups the user actively belongs to; drives socket room joins.
    pub fn active_group_ids_for(&self, user_id: UserId) -> Result<Vec<GroupId>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.group_id FROM group_members m
             JOIN groups g ON g.id = m.group_id
             WHERE m.user_id = ?1 AND m.left_at IS NULL AND g.deleted_at IS NULL",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], |row| get_id(row, 0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn add_member(&self, member: &GroupMember) -> Result<()> {
        insert_member_row(self.conn(), member)?;
        Ok(())
    }

    /// Change an active member's role. Returns `false` if no active row
    /// matched.
    pub fn set_member_role(&self, group_id: GroupId, user_id: UserId, role: GroupRole) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE group_members SET role = ?3
             WHERE group_id = ?1 AND user_id = ?2 AND left_at IS NULL",
            params![group_id.to_string(), user_id.to_string(), role.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Stamp `left_at` on an active membership. Returns `false` if the user
    /// was not an active member.
    pub fn mark_member_left(&self, group_id: GroupId, user_id: UserId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE group_members SET left_at = ?3
             WHERE group_id = ?1 AND user_id = ?2 AND left_at IS NULL",
            params![group_id.to_string(), user_id.to_string(), ts(&at)],
        )?;
        Ok(affected > 0)
    }

    pub fn count_active_admins(&self, group_id: GroupId) -> Result<u64> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM group_members
             WHERE group_id = ?1 AND role = 'ADMIN' AND left_at IS NULL",
            params![group_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count(n))
    }
}

fn row_to_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupMember> {
    Ok(GroupMember {
        group_id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        role: get_parsed(row, 2)?,
        joined_at: get_ts(row, 3)?,
        left_at: get_opt_ts(row, 4)?,
    })
}
