use serde_json::json;

use crate::ipc::error::{fail, ok};
use crate::ipc::helpers::optional_str;
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::navigation;
use crate::roster;

/// Tab set for a role, or for the role stored on a profile when `userId`
/// is given. Without either the signed-out common tabs are returned.
fn handle_navigation_screens(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match (
        optional_str(&req.params, "userId"),
        optional_str(&req.params, "role"),
        state.db.as_ref(),
    ) {
        (Some(user_id), _, Some(conn)) => roster::get_user(conn, &user_id).map(|u| Some(u.role)),
        (_, Some(raw), _) => Role::parse(&raw).map(Some),
        _ => Ok(None),
    };
    match role {
        Ok(role) => ok(
            &req.id,
            json!({
                "role": role.map(|r| r.as_str()),
                "entry": navigation::entry_route(role.is_some()),
                "routes": navigation::screens_for(role),
            }),
        ),
        Err(e) => fail(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "navigation.screens" => Some(handle_navigation_screens(state, req)),
        _ => None,
    }
}
