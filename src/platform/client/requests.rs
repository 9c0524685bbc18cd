//! Request bodies sent to the identity and inventory services.

use crate::config::PlatformConfig;
use serde::Serialize;
use serde_json::{Map, Value};

/// Keystone v3 password authentication scoped to a project
#[derive(Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub auth: Auth<'a>,
}

#[derive(Serialize)]
pub(crate) struct Auth<'a> {
    pub identity: Identity<'a>,
    pub scope: Scope<'a>,
}

#[derive(Serialize)]
pub(crate) struct Identity<'a> {
    pub methods: [&'static str; 1],
    pub password: Password<'a>,
}

#[derive(Serialize)]
pub(crate) struct Password<'a> {
    pub user: User<'a>,
}

#[derive(Serialize)]
pub(crate) struct User<'a> {
    pub name: &'a str,
    pub domain: Domain<'a>,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct Domain<'a> {
    pub name: &'a str,
}

#[derive(Serialize)]
pub(crate) struct Scope<'a> {
    pub project: Project<'a>,
}

#[derive(Serialize)]
pub(crate) struct Project<'a> {
    pub name: &'a str,
    pub domain: Domain<'a>,
}

impl<'a> AuthRequest<'a> {
    pub(crate) fn password(config: &'a PlatformConfig) -> Self {
        Self {
            auth: Auth {
                identity: Identity {
                    methods: ["password"],
                    password: Password {
                        user: User {
                            name: &config.username,
                            domain: Domain {
                                name: &config.user_domain,
                            },
                            password: config.password.as_str(),
                        },
                    },
                },
                scope: Scope {
                    project: Project {
                        name: &config.project_name,
                        domain: Domain {
                            name: &config.project_domain,
                        },
                    },
                },
            },
        }
    }
}

/// One JSON-patch operation
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct PatchOp {
    pub op: &'static str,
    pub path: String,
    pub value: Value,
}

/// `replace` operations for every changed attribute, ordered by attribute name
pub(crate) fn replace_ops(changes: &Map<String, Value>) -> Vec<PatchOp> {
    changes
        .iter()
        .map(|(field, value)| PatchOp {
            op: "replace",
            path: format!("/{field}"),
            value: value.clone(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct StrategyRequest<'a> {
    pub resource: &'a str,
    pub action: &'a str,
    pub targets: &'a [String],
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_ops_replace_each_changed_field() {
        let mut changes = Map::new();
        changes.insert("imtu".to_string(), json!(9000));
        changes.insert("ifclass".to_string(), json!("platform"));
        let ops = serde_json::to_value(replace_ops(&changes)).unwrap();
        assert_eq!(
            ops,
            json!([
                {"op": "replace", "path": "/ifclass", "value": "platform"},
                {"op": "replace", "path": "/imtu", "value": 9000},
            ])
        );
    }
}
