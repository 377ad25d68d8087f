use serde_json::json;

use crate::error::Result;
use crate::ipc::helpers::{optional_str, required_str, to_json, with_db};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::roster;
use rusqlite::Connection;

fn users_register(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let name = required_str(params, "name")?;
    let role = Role::parse(&required_str(params, "role")?)?;
    let group_id = optional_str(params, "groupId");
    let user = roster::register_user(conn, &name, role, group_id.as_deref())?;
    Ok(json!({ "user": to_json(&user)? }))
}

fn users_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let user = roster::get_user(conn, &required_str(params, "userId")?)?;
    Ok(json!({ "user": to_json(&user)? }))
}

fn groups_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let teacher_id = required_str(params, "teacherId")?;
    let name = required_str(params, "name")?;
    let description = optional_str(params, "description").unwrap_or_default();
    let group = roster::create_group(conn, &teacher_id, &name, &description)?;
    Ok(json!({ "group": to_json(&group)? }))
}

fn groups_join(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let group = roster::join_group(
        conn,
        &required_str(params, "userId")?,
        &required_str(params, "code")?,
    )?;
    Ok(json!({ "group": to_json(&group)? }))
}

fn groups_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let group = roster::get_group(conn, &required_str(params, "groupId")?)?;
    Ok(json!({ "group": to_json(&group)? }))
}

fn groups_students(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let students = roster::list_students(conn, &required_str(params, "groupId")?)?;
    Ok(json!({ "students": to_json(&students)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "users.register" => users_register,
        "users.get" => users_get,
        "groups.create" => groups_create,
        "groups.join" => groups_join,
        "groups.get" => groups_get,
        "groups.students" => groups_students,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
