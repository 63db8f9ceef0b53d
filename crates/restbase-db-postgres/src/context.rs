//! Request-scoped security context.
//!
//! A [`SecurityContext`] is built per request and moved into the
//! transaction that uses it. It is not `Clone`: one context applies to
//! exactly one transaction.

use serde_json::{Value, json};

use crate::config::RlsConfig;

/// Transaction-local setting names read by row-level-security policies.
pub const CLAIMS_SETTING: &str = "request.jwt.claims";
pub const SUB_SETTING: &str = "request.jwt.claim.sub";
pub const ROLE_CLAIM_SETTING: &str = "request.jwt.claim.role";
const STATEMENT_TIMEOUT_SETTING: &str = "statement_timeout";
const ROLE_SETTING: &str = "role";

/// Identity of the caller for one request.
#[derive(Debug)]
pub struct SecurityContext {
    user_id: Option<String>,
    role: String,
    claims: Value,
}

impl SecurityContext {
    /// Context for an unauthenticated caller.
    pub fn anonymous(config: &RlsConfig) -> Self {
        Self {
            user_id: None,
            role: config.anon_role.clone(),
            claims: json!({ "role": config.anon_role }),
        }
    }

    /// Context for an authenticated caller.
    ///
    /// The role comes from the `role` claim when present, otherwise the
    /// configured authenticated role.
    pub fn authenticated(user_id: impl Into<String>, claims: Value, config: &RlsConfig) -> Self {
        Self {
            user_id: Some(user_id.into()),
            role: role_from_claims(&claims, config),
            claims,
        }
    }

    /// Build from verified token claims; `None` means anonymous.
    ///
    /// The user id is the `sub` claim.
    pub fn from_claims(claims: Option<Value>, config: &RlsConfig) -> Self {
        match claims {
            None => Self::anonymous(config),
            Some(claims) => Self {
                user_id: claims.get("sub").and_then(Value::as_str).map(str::to_string),
                role: role_from_claims(&claims, config),
                claims,
            },
        }
    }

    /// Override the database role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn claims(&self) -> &Value {
        &self.claims
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Transaction-local settings in the order they are applied.
    ///
    /// The role switch comes last so the claim variables are in place
    /// whatever the role is allowed to read.
    pub fn settings(&self, config: &RlsConfig) -> Vec<(&'static str, String)> {
        let mut settings = Vec::with_capacity(5);
        if let Some(timeout) = config.statement_timeout_ms {
            settings.push((STATEMENT_TIMEOUT_SETTING, timeout.to_string()));
        }
        settings.push((CLAIMS_SETTING, self.claims.to_string()));
        settings.push((ROLE_CLAIM_SETTING, self.role.clone()));
        if let Some(user_id) = &self.user_id {
            settings.push((SUB_SETTING, user_id.clone()));
        }
        if config.switch_role {
            settings.push((ROLE_SETTING, self.role.clone()));
        }
        settings
    }
}

fn role_from_claims(claims: &Value, config: &RlsConfig) -> String {
    claims
        .get("role")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
        .map_or_else(|| config.authenticated_role.clone(), str::to_string)
}

/// `SELECT set_config($1, $2, true), ...` for `count` settings.
///
/// Names and values are both bound, and the third argument makes every
/// setting local to the current transaction.
pub fn set_config_statement(count: usize) -> String {
    let calls: Vec<String> = (0..count)
        .map(|i| format!("set_config(${}, ${}, true)", 2 * i + 1, 2 * i + 2))
        .collect();
    format!("SELECT {}", calls.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_context() {
        let ctx = SecurityContext::anonymous(&RlsConfig::default());
        assert!(ctx.is_anonymous());
        assert_eq!(ctx.role(), "anon");
        assert_eq!(ctx.claims()["role"], "anon");
    }

    #[test]
    fn test_role_claim_wins() {
        let config = RlsConfig::default();
        let ctx = SecurityContext::authenticated("u1", json!({"role": "editor"}), &config);
        assert_eq!(ctx.role(), "editor");

        let ctx = SecurityContext::authenticated("u1", json!({}), &config);
        assert_eq!(ctx.role(), "authenticated");
    }

    #[test]
    fn test_from_claims() {
        let config = RlsConfig::default();
        let ctx = SecurityContext::from_claims(Some(json!({"sub": "abc"})), &config);
        assert_eq!(ctx.user_id(), Some("abc"));
        assert_eq!(ctx.role(), "authenticated");

        let ctx = SecurityContext::from_claims(Some(json!({"role": "service"})), &config);
        assert_eq!(ctx.user_id(), None);
        assert_eq!(ctx.role(), "service");

        assert!(SecurityContext::from_claims(None, &config).is_anonymous());
    }

    #[test]
    fn test_settings_order() {
        let config = RlsConfig::default().with_statement_timeout_ms(Some(1500));
        let ctx = SecurityContext::authenticated("u1", json!({"sub": "u1"}), &config);
        let names: Vec<&str> = ctx.settings(&config).iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "statement_timeout",
                CLAIMS_SETTING,
                ROLE_CLAIM_SETTING,
                SUB_SETTING,
                "role"
            ]
        );
    }

    #[test]
    fn test_settings_without_role_switch() {
        let config = RlsConfig::default().with_switch_role(false);
        let ctx = SecurityContext::anonymous(&config);
        let settings = ctx.settings(&config);
        assert!(settings.iter().all(|(name, _)| *name != "role"));
        assert!(settings.iter().all(|(name, _)| *name != SUB_SETTING));
    }

    #[test]
    fn test_set_config_statement() {
        assert_eq!(
            set_config_statement(2),
            "SELECT set_config($1, $2, true), set_config($3, $4, true)"
        );
    }
}
