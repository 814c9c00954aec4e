use serde::Serialize;

/// Path of the login view
pub const LOGIN_PATH: &str = "/login";

/// A navigable view and whether it needs an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub name: String,
    /// `/`-separated pattern; a `:name` segment matches any one segment
    pub path: String,
    pub requires_auth: bool,
}

impl Route {
    pub fn public(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            requires_auth: false,
        }
    }

    pub fn protected(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            requires_auth: true,
        }
    }

    /// Whether a concrete path (query and fragment allowed) matches this route's pattern
    pub fn matches(&self, path: &str) -> bool {
        let mut pattern = segments(&self.path);
        let mut actual = segments(strip_query(path));

        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return true,
                (Some(p), Some(a)) if p.starts_with(':') || p == a => continue,
                _ => return false,
            }
        }
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or_default()
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Ordered route table; the first matching route wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The RecipeVault client's views
    pub fn recipe_vault() -> Self {
        Self::new(vec![
            Route::public("home", "/"),
            Route::public("login", LOGIN_PATH),
            Route::public("register", "/register"),
            Route::protected("create-recipe", "/create"),
            Route::protected("edit-recipe", "/recipe/:id/edit"),
            Route::public("recipe-detail", "/recipe/:id"),
            Route::protected("account", "/account"),
        ])
    }

    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Whether navigating to `path` needs a session. Unknown paths do.
    pub fn requires_auth(&self, path: &str) -> bool {
        self.resolve(path).map(|route| route.requires_auth).unwrap_or(true)
    }
}
