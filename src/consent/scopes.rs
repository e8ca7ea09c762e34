//! Scope-to-permission descriptions shown on the consent screen.

/// Human-readable rendering of one requested scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDescription {
    pub scope: String,
    pub summary: String,
}

/// Known scopes and their descriptions.
const KNOWN_SCOPES: &[(&str, &str)] = &[
    ("openid", "Confirm who you are"),
    ("profile", "Read your basic profile (name and avatar)"),
    ("email", "Read your email address"),
    ("identities", "Read the identities linked to your account"),
];

/// Describe one scope. Unknown scopes are synthesized from their
/// `resource:action` form instead of being dropped; the consent screen
/// always shows everything the client asked for.
pub fn describe(scope: &str) -> PermissionDescription {
    if let Some((_, summary)) = KNOWN_SCOPES.iter().find(|(name, _)| *name == scope) {
        return PermissionDescription {
            scope: scope.to_string(),
            summary: (*summary).to_string(),
        };
    }

    let summary = match scope.split_once(':') {
        Some((resource, action)) if !resource.is_empty() && !action.is_empty() => match action {
            "read" => format!("Read your {resource}"),
            "write" | "modify" => format!("Modify your {resource}"),
            other => format!("Perform {other} on your {resource}"),
        },
        _ => format!("Access your {scope} data"),
    };
    PermissionDescription {
        scope: scope.to_string(),
        summary,
    }
}

/// Describe a whitespace-separated scope list, in request order.
pub fn describe_all(scope: &str) -> Vec<PermissionDescription> {
    scope.split_whitespace().map(describe).collect()
}
