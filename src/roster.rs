//! Profiles and groups.
//!
//! Authentication lives with the identity provider; this module only keeps
//! the principal's display name, role and group membership, which is what
//! review authorization and the leaderboard need.

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::db::{column_err, now_timestamp};
use crate::error::{NgajiError, Result};
use crate::model::{Group, Role, User};

const JOIN_CODE_LEN: usize = 6;
const JOIN_CODE_ATTEMPTS: usize = 8;

const USER_COLUMNS: &str = "id, name, role, group_id, created_at";
const GROUP_COLUMNS: &str = "id, name, description, teacher_id, code, created_at";

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = r.get(2)?;
    Ok(User {
        id: r.get(0)?,
        name: r.get(1)?,
        role: Role::parse(&role).map_err(|e| column_err(2, e))?,
        group_id: r.get(3)?,
        created_at: r.get(4)?,
    })
}

fn group_from_row(r: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        teacher_id: r.get(3)?,
        code: r.get(4)?,
        created_at: r.get(5)?,
    })
}

pub fn register_user(
    conn: &Connection,
    name: &str,
    role: Role,
    group_id: Option<&str>,
) -> Result<User> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NgajiError::validation("name must not be empty"));
    }
    if let Some(gid) = group_id {
        get_group(conn, gid)?;
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        role,
        group_id: group_id.map(|s| s.to_string()),
        created_at: now_timestamp(),
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users(id, name, role, group_id, created_at) VALUES(?, ?, ?, ?, ?)",
        (
            &user.id,
            &user.name,
            user.role.as_str(),
            &user.group_id,
            &user.created_at,
        ),
    )?;
    // Students start on the leaderboard with zero points.
    if role == Role::Student {
        tx.execute(
            "INSERT INTO student_ledgers(student_id, updated_at) VALUES(?, ?)",
            (&user.id, &user.created_at),
        )?;
    }
    tx.commit()?;

    info!(user_id = %user.id, role = role.as_str(), "registered user");
    Ok(user)
}

pub fn get_user(conn: &Connection, user_id: &str) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
        [user_id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| NgajiError::not_found(format!("user {} not found", user_id)))
}

pub fn get_group(conn: &Connection, group_id: &str) -> Result<Group> {
    conn.query_row(
        &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?"),
        [group_id],
        group_from_row,
    )
    .optional()?
    .ok_or_else(|| NgajiError::not_found(format!("group {} not found", group_id)))
}

/// Creates a group owned by `teacher_id` and moves the teacher into it.
pub fn create_group(
    conn: &Connection,
    teacher_id: &str,
    name: &str,
    description: &str,
) -> Result<Group> {
    let teacher = get_user(conn, teacher_id)?;
    if !teacher.role.can_review() {
        return Err(NgajiError::forbidden("only teachers can create groups"));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(NgajiError::validation("group name must not be empty"));
    }

    let code = unused_join_code(conn)?;
    let group = Group {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: description.trim().to_string(),
        teacher_id: teacher.id,
        code,
        created_at: now_timestamp(),
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO groups(id, name, description, teacher_id, code, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &group.id,
            &group.name,
            &group.description,
            &group.teacher_id,
            &group.code,
            &group.created_at,
        ),
    )?;
    tx.execute(
        "UPDATE users SET group_id = ? WHERE id = ?",
        (&group.id, &group.teacher_id),
    )?;
    tx.commit()?;

    info!(group_id = %group.id, code = %group.code, "created group");
    Ok(group)
}

pub fn join_group(conn: &Connection, user_id: &str, code: &str) -> Result<Group> {
    let user = get_user(conn, user_id)?;
    let code = code.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(NgajiError::validation("code must not be empty"));
    }
    let group = conn
        .query_row(
            &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE code = ?"),
            [&code],
            group_from_row,
        )
        .optional()?
        .ok_or_else(|| NgajiError::not_found(format!("no group with code {}", code)))?;

    conn.execute(
        "UPDATE users SET group_id = ? WHERE id = ?",
        (&group.id, &user.id),
    )?;
    info!(user_id = %user.id, group_id = %group.id, "joined group");
    Ok(group)
}

/// Students of a group, most recently registered first.
pub fn list_students(conn: &Connection, group_id: &str) -> Result<Vec<User>> {
    get_group(conn, group_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE group_id = ? AND role = 'student'
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let users = stmt
        .query_map([group_id], user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

fn unused_join_code(conn: &Connection) -> Result<String> {
    for _ in 0..JOIN_CODE_ATTEMPTS {
        let code = generate_join_code();
        let taken = conn
            .query_row("SELECT 1 FROM groups WHERE code = ?", [&code], |r| {
                r.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        if !taken {
            return Ok(code);
        }
    }
    Err(NgajiError::Transport(
        "could not allocate a unique group code".to_string(),
    ))
}

fn generate_join_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(JOIN_CODE_LEN)
        .collect::<String>()
        .to_ascii_uppercase()
}
