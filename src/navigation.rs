use serde::Serialize;

use crate::model::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    pub name: &'static str,
    pub title: &'static str,
}

const HOME: Route = Route { name: "home", title: "Home" };
const QURAN: Route = Route { name: "quran", title: "Al-Quran" };
const PROFILE: Route = Route { name: "profile", title: "Profile" };

/// Tab set for a signed-in principal. Recomputed whenever the session's
/// role changes; nothing is cached between calls.
pub fn screens_for(role: Option<Role>) -> Vec<Route> {
    let mut routes = vec![HOME, QURAN];
    let extra: &[Route] = match role {
        Some(Role::Student) => &[
            Route { name: "submissions", title: "Submissions" },
            Route { name: "quiz", title: "Quiz" },
            PROFILE,
        ],
        Some(Role::Teacher) => &[
            Route { name: "review", title: "Review" },
            Route { name: "group", title: "Class" },
            PROFILE,
        ],
        Some(Role::Parent) => &[Route { name: "monitoring", title: "Monitoring" }, PROFILE],
        Some(Role::Admin) => &[Route { name: "admin", title: "Admin" }, PROFILE],
        None => &[],
    };
    routes.extend_from_slice(extra);
    routes
}

/// Where the app lands on launch.
pub fn entry_route(signed_in: bool) -> &'static str {
    if signed_in {
        "tabs"
    } else {
        "welcome"
    }
}
