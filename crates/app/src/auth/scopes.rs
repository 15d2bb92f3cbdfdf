//! `resource:action` scopes carried by service credentials.

use serde::Serialize;

pub const FLEET_READ: &str = "fleet:read";
pub const FLEET_WRITE: &str = "fleet:write";
pub const SHIPMENTS_READ: &str = "shipments:read";
pub const SHIPMENTS_WRITE: &str = "shipments:write";

/// What a service credential may do within its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "access", content = "scopes")]
pub enum ServiceScopes {
    /// Keys without a scope list, and callback tokens.
    Full,

    /// Only the listed scopes. `resource:*` grants every action on a resource.
    Limited(Vec<String>),
}

impl ServiceScopes {
    #[must_use]
    pub fn from_key(scopes: Option<&[String]>) -> Self {
        scopes.map_or(Self::Full, |scopes| Self::Limited(scopes.to_vec()))
    }

    #[must_use]
    pub fn allows(&self, required: &str) -> bool {
        match self {
            Self::Full => true,
            Self::Limited(granted) => granted.iter().any(|scope| scope_matches(scope, required)),
        }
    }
}

fn scope_matches(granted: &str, required: &str) -> bool {
    if granted == required {
        return true;
    }

    match (granted.split_once(':'), required.split_once(':')) {
        (Some((granted_resource, "*")), Some((required_resource, _))) => {
            granted_resource == required_resource
        }
        _ => false,
    }
}

/// Whether `scope` has the `resource:action` shape.
#[must_use]
pub fn is_well_formed(scope: &str) -> bool {
    scope.split_once(':').is_some_and(|(resource, action)| {
        !resource.is_empty()
            && !action.is_empty()
            && !action.contains(':')
            && scope.chars().all(|c| c.is_ascii_lowercase() || c == '_' || c == ':' || c == '*')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(scopes: &[&str]) -> ServiceScopes {
        ServiceScopes::Limited(scopes.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn keys_without_scopes_have_full_access() {
        assert_eq!(ServiceScopes::from_key(None), ServiceScopes::Full);
        assert!(ServiceScopes::Full.allows(FLEET_WRITE));
    }

    #[test]
    fn empty_scope_lists_allow_nothing() {
        assert!(!ServiceScopes::from_key(Some(&[])).allows(FLEET_READ));
    }

    #[test]
    fn exact_scopes_match() {
        let scopes = limited(&[FLEET_READ]);

        assert!(scopes.allows(FLEET_READ));
        assert!(!scopes.allows(FLEET_WRITE));
        assert!(!scopes.allows(SHIPMENTS_READ));
    }

    #[test]
    fn wildcard_actions_cover_the_resource() {
        let scopes = limited(&["fleet:*"]);

        assert!(scopes.allows(FLEET_READ));
        assert!(scopes.allows(FLEET_WRITE));
        assert!(!scopes.allows(SHIPMENTS_READ));
    }

    #[test]
    fn scope_shape_is_checked() {
        assert!(is_well_formed("fleet:read"));
        assert!(is_well_formed("shipments:*"));
        assert!(!is_well_formed("fleet"));
        assert!(!is_well_formed(":read"));
        assert!(!is_well_formed("fleet:"));
        assert!(!is_well_formed("Fleet:Read"));
        assert!(!is_well_formed("a:b:c"));
    }
}
