//! Route guard policy, a pure function of [`Mode`].

use serde::Serialize;

use super::mode::Mode;

/// Portal routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Onboarding,
    Dashboard,
    Requests,
    Profile,
    Unknown(String),
}

/// Access class a route belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Login,
    Onboarding,
    Protected,
    Unknown,
}

impl Route {
    /// Every route with a fixed path.
    pub const KNOWN: [Route; 5] = [
        Self::Login,
        Self::Onboarding,
        Self::Dashboard,
        Self::Requests,
        Self::Profile,
    ];

    /// Parse a location. Accepts hash-router forms (`#/profile`), ignores
    /// query strings, trailing slashes and case.
    pub fn parse(location: &str) -> Self {
        let path = location.trim().trim_start_matches('#');
        let path = path.split(['?', '#']).next().unwrap_or("");
        let path = path.trim_end_matches('/').to_lowercase();
        match path.as_str() {
            "" | "/login" => Self::Login,
            "/onboarding" => Self::Onboarding,
            "/dashboard" => Self::Dashboard,
            "/requests" => Self::Requests,
            "/profile" => Self::Profile,
            _ => Self::Unknown(location.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Login => "/login",
            Self::Onboarding => "/onboarding",
            Self::Dashboard => "/dashboard",
            Self::Requests => "/requests",
            Self::Profile => "/profile",
            Self::Unknown(path) => path,
        }
    }

    pub fn class(&self) -> RouteClass {
        match self {
            Self::Login => RouteClass::Login,
            Self::Onboarding => RouteClass::Onboarding,
            Self::Dashboard | Self::Requests | Self::Profile => RouteClass::Protected,
            Self::Unknown(_) => RouteClass::Unknown,
        }
    }

    /// The single route each mode lands on.
    pub fn landing(mode: Mode) -> Self {
        match mode {
            Mode::Unauthenticated => Self::Login,
            Mode::NeedsOnboarding => Self::Onboarding,
            Mode::Authenticated => Self::Dashboard,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
}

/// Decide whether `route` may be shown in `mode`.
pub fn evaluate(route: &Route, mode: Mode) -> GuardDecision {
    use GuardDecision::{Allow, Redirect};

    match (route.class(), mode) {
        (RouteClass::Login, Mode::Unauthenticated) => Allow,
        (RouteClass::Login, Mode::NeedsOnboarding) => Redirect(Route::Onboarding),
        (RouteClass::Login, Mode::Authenticated) => Redirect(Route::Dashboard),

        (RouteClass::Onboarding, Mode::Unauthenticated) => Redirect(Route::Login),
        (RouteClass::Onboarding, Mode::NeedsOnboarding) => Allow,
        (RouteClass::Onboarding, Mode::Authenticated) => Redirect(Route::Dashboard),

        (RouteClass::Protected, Mode::Unauthenticated) => Redirect(Route::Login),
        (RouteClass::Protected, Mode::NeedsOnboarding) => Redirect(Route::Onboarding),
        (RouteClass::Protected, Mode::Authenticated) => Allow,

        (RouteClass::Unknown, mode) => Redirect(Route::landing(mode)),
    }
}

/// Follow redirects from `location` to the route that is finally shown.
pub fn resolve(location: &str, mode: Mode) -> Route {
    let mut route = Route::parse(location);
    // Every redirect target is allowed in the same mode, so one hop settles it.
    for _ in 0..2 {
        match evaluate(&route, mode) {
            GuardDecision::Allow => return route,
            GuardDecision::Redirect(next) => route = next,
        }
    }
    Route::landing(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_routes() -> Vec<Route> {
        let mut routes = Route::KNOWN.to_vec();
        routes.push(Route::Unknown("/nope".into()));
        routes
    }

    #[test]
    fn parse_normalizes_locations() {
        assert_eq!(Route::parse("/"), Route::Login);
        assert_eq!(Route::parse(""), Route::Login);
        assert_eq!(Route::parse("#/profile"), Route::Profile);
        assert_eq!(Route::parse("/dashboard/"), Route::Dashboard);
        assert_eq!(Route::parse("/Requests?tab=history"), Route::Requests);
        assert_eq!(Route::parse("/admin"), Route::Unknown("/admin".into()));
    }

    #[test]
    fn table_matches_policy() {
        use GuardDecision::{Allow, Redirect};
        use Mode::*;

        assert_eq!(evaluate(&Route::Login, Unauthenticated), Allow);
        assert_eq!(evaluate(&Route::Login, NeedsOnboarding), Redirect(Route::Onboarding));
        assert_eq!(evaluate(&Route::Login, Authenticated), Redirect(Route::Dashboard));

        assert_eq!(evaluate(&Route::Onboarding, Unauthenticated), Redirect(Route::Login));
        assert_eq!(evaluate(&Route::Onboarding, NeedsOnboarding), Allow);
        assert_eq!(evaluate(&Route::Onboarding, Authenticated), Redirect(Route::Dashboard));

        for protected in [Route::Dashboard, Route::Requests, Route::Profile] {
            assert_eq!(evaluate(&protected, Unauthenticated), Redirect(Route::Login));
            assert_eq!(evaluate(&protected, NeedsOnboarding), Redirect(Route::Onboarding));
            assert_eq!(evaluate(&protected, Authenticated), Allow);
        }
    }

    #[test]
    fn unknown_paths_go_to_landing() {
        let unknown = Route::Unknown("/x".into());
        for mode in Mode::ALL {
            assert_eq!(
                evaluate(&unknown, mode),
                GuardDecision::Redirect(Route::landing(mode))
            );
        }
    }

    #[test]
    fn exactly_one_route_class_lands_per_mode() {
        for mode in Mode::ALL {
            let landing = Route::landing(mode);
            assert_eq!(evaluate(&landing, mode), GuardDecision::Allow);
        }
    }

    #[test]
    fn redirect_targets_are_allowed_so_no_cycles() {
        for mode in Mode::ALL {
            for route in all_routes() {
                if let GuardDecision::Redirect(target) = evaluate(&route, mode) {
                    assert_eq!(
                        evaluate(&target, mode),
                        GuardDecision::Allow,
                        "{route} in {mode} redirects to {target}, which is not allowed"
                    );
                }
            }
        }
    }

    #[test]
    fn resolve_follows_redirects() {
        assert_eq!(resolve("/dashboard", Mode::NeedsOnboarding), Route::Onboarding);
        assert_eq!(resolve("/", Mode::Authenticated), Route::Dashboard);
        assert_eq!(resolve("/whatever", Mode::Unauthenticated), Route::Login);
        assert_eq!(resolve("/profile", Mode::Authenticated), Route::Profile);
    }
}
