//! Per-request identity: Lizmap groups, user login and edition context.
//!
//! The Lizmap web client forwards the authenticated identity to QGIS Server
//! through dedicated headers. When a header is absent, the equivalent
//! request parameter is used instead.

/// Header names set by the Lizmap web client.
pub mod headers {
    pub const USER_GROUPS: &str = "X-Lizmap-User-Groups";
    pub const USER: &str = "X-Lizmap-User";
    pub const EDITION_CONTEXT: &str = "X-Lizmap-Edition-Context";
}

/// Request parameters used when the headers are absent.
pub mod params {
    pub const USER_GROUPS: &str = "LIZMAP_USER_GROUPS";
    pub const USER: &str = "LIZMAP_USER";
    pub const EDITION_CONTEXT: &str = "LIZMAP_EDITION_CONTEXT";
}

/// Identity and session flags of a single request.
///
/// Built at request start and dropped when the response is written; it never
/// outlives the request nor references project state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Lizmap group ids of the user. May be empty.
    pub groups: Vec<String>,
    /// Authenticated login, if any.
    pub user_login: Option<String>,
    /// Whether the request originates from an editing session.
    pub editing: bool,
}

impl RequestContext {
    /// Context for a request without any identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builds a context from the raw header/parameter values.
    #[must_use]
    pub fn from_raw(groups: Option<&str>, user: Option<&str>, edition: Option<&str>) -> Self {
        Self {
            groups: groups.map(parse_groups).unwrap_or_default(),
            user_login: user.and_then(parse_login),
            editing: edition.is_some_and(parse_flag),
        }
    }

    /// No group and no login: nothing to filter on.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.groups.is_empty() && self.user_login.is_none()
    }
}

/// Splits a comma separated group list, trimming entries and dropping empty ones.
#[must_use]
pub fn parse_groups(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trimmed login, `None` when blank.
#[must_use]
pub fn parse_login(raw: &str) -> Option<String> {
    let login = raw.trim();
    (!login.is_empty()).then(|| login.to_string())
}

/// Truthy values for the edition context flag.
#[must_use]
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
