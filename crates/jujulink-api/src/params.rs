//! Request parameter types and the normalization rules applied to them
//! before they reach either protocol generation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Constants ───────────────────────────────────────────────────────

/// Placement scope meaning "an existing machine".
pub const MACHINE_SCOPE: &str = "#";

/// Container types accepted as placement scopes.
pub const CONTAINER_TYPES: &[&str] = &["lxc", "lxd", "kvm"];

/// Job assigned to machines added without explicit jobs.
pub const JOB_HOST_UNITS: &str = "JobHostUnits";

// ── Constraints ─────────────────────────────────────────────────────

/// Constraints understood by every provider.
pub const GENERIC_CONSTRAINTS: &[&str] = &[
    "cpu-power",
    "cpu-cores",
    "mem",
    "arch",
    "tags",
    "root-disk",
];

/// The subset of [`GENERIC_CONSTRAINTS`] that carries integers.
pub const INTEGER_CONSTRAINTS: &[&str] = &["cpu-power", "cpu-cores", "mem", "root-disk"];

const TAG_CONSTRAINT: &str = "tags";

/// A single normalized constraint value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    Integer(i64),
    Tags(Vec<String>),
    Text(String),
}

/// Normalized constraints, ready to be sent.
pub type Constraints = BTreeMap<String, ConstraintValue>;

/// Constraints as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawConstraints {
    #[default]
    None,
    /// Whitespace-separated `key=value` pairs, e.g. `"cpu-cores=4 mem=2048"`.
    Text(String),
    /// Already keyed values; may hold strings or numbers.
    Map(Map<String, Value>),
}

impl From<&str> for RawConstraints {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Map<String, Value>> for RawConstraints {
    fn from(value: Map<String, Value>) -> Self {
        Self::Map(value)
    }
}

/// Normalize caller constraints.
///
/// Integer keys are parsed leniently and dropped when they do not parse;
/// zero is kept. String keys are trimmed and dropped when empty. Names
/// outside [`GENERIC_CONSTRAINTS`] are dropped. `tags` is split on commas,
/// inner whitespace in each tag becomes a dash, and empty tags are
/// removed; an all-separator value still yields an empty list.
pub fn prepare_constraints(raw: &RawConstraints) -> Constraints {
    let pairs: Vec<(String, Value)> = match raw {
        RawConstraints::None => return Constraints::new(),
        RawConstraints::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        RawConstraints::Text(text) => text
            .split_whitespace()
            .filter_map(|pair| {
                let parts: Vec<&str> = pair.split('=').collect();
                if let [key, value] = parts.as_slice() {
                    Some(((*key).to_owned(), Value::String((*value).to_owned())))
                } else {
                    tracing::warn!(constraint = pair, "skipping malformed constraint");
                    None
                }
            })
            .collect(),
    };

    let mut constraints = Constraints::new();
    for (key, value) in pairs {
        if INTEGER_CONSTRAINTS.contains(&key.as_str()) {
            if let Some(n) = integer_value(&value) {
                constraints.insert(key, ConstraintValue::Integer(n));
            }
            continue;
        }
        if !GENERIC_CONSTRAINTS.contains(&key.as_str()) {
            tracing::debug!(constraint = %key, "dropping unknown constraint");
            continue;
        }

        let Some(text) = text_value(&value) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        if key == TAG_CONSTRAINT {
            let tags = text
                .split(',')
                .map(|tag| tag.split_whitespace().collect::<Vec<_>>().join("-"))
                .filter(|tag| !tag.is_empty())
                .collect();
            constraints.insert(key, ConstraintValue::Tags(tags));
        } else {
            constraints.insert(key, ConstraintValue::Text(text));
        }
    }
    constraints
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => parse_leading_integer(s),
        _ => None,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse an optionally signed run of leading digits, ignoring leading
/// whitespace and any trailing text (`"12GB"` → 12).
fn parse_leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

// ── Placement ───────────────────────────────────────────────────────

/// Where a unit or machine should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub scope: String,
    pub directive: String,
}

/// Parse a placement directive.
///
/// `"scope:directive"` splits on the single colon; a bare container type
/// means a new container of that type; anything else is a machine id in
/// the machine scope. Empty input means no placement.
pub fn parse_placement(spec: &str) -> Option<Placement> {
    if spec.is_empty() {
        return None;
    }
    let parts: Vec<&str> = spec.split(':').collect();
    let (scope, directive) = match parts.as_slice() {
        [scope, directive] => (*scope, *directive),
        [container, ..] if CONTAINER_TYPES.contains(container) => (*container, ""),
        [first, ..] => (MACHINE_SCOPE, *first),
        [] => return None,
    };
    Some(Placement {
        scope: scope.to_owned(),
        directive: directive.to_owned(),
    })
}

// ── Endpoints ───────────────────────────────────────────────────────

/// One side of a relation, as requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub application: String,
    pub relation: Option<String>,
}

impl Endpoint {
    pub fn new(application: impl Into<String>, relation: Option<&str>) -> Self {
        Self {
            application: application.into(),
            relation: relation.map(str::to_owned),
        }
    }

    /// `"app:relation"`, or just `"app"` when no relation name is given.
    pub fn wire_name(&self) -> String {
        match &self.relation {
            Some(relation) => format!("{}:{relation}", self.application),
            None => self.application.clone(),
        }
    }
}

/// An endpoint as reported back by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RelationEndpoint {
    pub application: String,
    pub name: String,
    pub interface: String,
    pub scope: String,
    pub role: String,
}

/// `"<requirer> <provider>"`, each as `app:name`. Missing roles are left empty.
pub fn relation_key(endpoints: &[RelationEndpoint]) -> String {
    let side = |role: &str| {
        endpoints
            .iter()
            .find(|ep| ep.role == role)
            .map(|ep| format!("{}:{}", ep.application, ep.name))
            .unwrap_or_default()
    };
    format!("{} {}", side("requirer"), side("provider"))
}

// ── Values and tags ─────────────────────────────────────────────────

/// Convert every non-null value to its string form. Strings pass through
/// unquoted; nulls are preserved.
pub fn stringify_values(values: &Map<String, Value>) -> Map<String, Value> {
    values
        .iter()
        .map(|(k, v)| {
            let out = match v {
                Value::Null => Value::Null,
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            };
            (k.clone(), out)
        })
        .collect()
}

/// `"<kind>-<name>"`, e.g. `application-django`.
pub fn entity_tag(kind: &str, name: &str) -> String {
    format!("{kind}-{name}")
}

/// Prefix a bare user name with `user-`; already-tagged names pass through.
pub fn user_tag(user: &str) -> String {
    if user.starts_with("user-") {
        user.to_owned()
    } else {
        entity_tag("user", user)
    }
}

// ── Request payloads ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeployRequest {
    pub charm_url: String,
    pub application_name: String,
    pub series: Option<String>,
    pub config: Map<String, Value>,
    pub config_yaml: Option<String>,
    pub num_units: u32,
    pub constraints: Constraints,
    /// Raw machine spec, e.g. `"lxc:2"`.
    pub to_machine: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddUnitsRequest {
    pub application_name: String,
    pub num_units: u32,
    pub to_machine: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateApplicationRequest {
    pub application_name: String,
    pub charm_url: Option<String>,
    pub force_units: bool,
    pub force_series: bool,
    pub settings: Option<Map<String, Value>>,
    pub constraints: Option<Constraints>,
    pub min_units: Option<u32>,
}

/// One machine (or container) to add.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MachineSpec {
    pub jobs: Vec<String>,
    pub series: Option<String>,
    pub parent_id: Option<String>,
    pub container_type: Option<String>,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OfferRequest {
    pub application_name: String,
    pub endpoints: Vec<String>,
    pub user: String,
    pub model_name: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub allowed_users: Vec<String>,
}

impl OfferRequest {
    /// The explicit URL, or `local:/u/<user>/<model>/<application>`.
    pub fn resolved_url(&self) -> String {
        match &self.url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => {
                let user = self.user.strip_prefix("user-").unwrap_or(&self.user);
                format!(
                    "local:/u/{user}/{}/{}",
                    self.model_name, self.application_name
                )
            }
        }
    }

    /// Tagged allowed users; an empty list means public.
    pub fn allowed_user_tags(&self) -> Vec<String> {
        if self.allowed_users.is_empty() {
            return vec!["user-public".to_owned()];
        }
        self.allowed_users
            .iter()
            .map(|u| entity_tag("user", u))
            .collect()
    }
}

/// Parameters for the initial login exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginRequest {
    /// `user` must already be tagged (`user-admin`).
    Password { user_tag: String, password: String },
    /// Macaroon login; `None` for the first (challenge) round.
    Macaroons(Option<Value>),
    /// One-time token issued to an embedding front end (legacy only).
    Token(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> RawConstraints {
        match value {
            Value::Object(m) => RawConstraints::Map(m),
            _ => unreachable!(),
        }
    }

    #[test]
    fn constraint_map_is_normalized() {
        let out = prepare_constraints(&map(json!({
            "cpu-power": "",
            "cpu-cores": "4",
            "mem": "2000",
            "arch": "amd64",
            "tags": "foo, bar,,",
        })));
        let expected: Constraints = [
            ("arch".to_owned(), ConstraintValue::Text("amd64".into())),
            ("cpu-cores".to_owned(), ConstraintValue::Integer(4)),
            ("mem".to_owned(), ConstraintValue::Integer(2000)),
            (
                "tags".to_owned(),
                ConstraintValue::Tags(vec!["foo".into(), "bar".into()]),
            ),
        ]
        .into_iter()
        .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn constraint_string_is_parsed() {
        let out = prepare_constraints(&"tags=foo,bar cpu-cores=4 mem=1024 bogus".into());
        // "bogus" has no '=' and is skipped
        assert_eq!(out.get("cpu-cores"), Some(&ConstraintValue::Integer(4)));
        assert_eq!(out.get("mem"), Some(&ConstraintValue::Integer(1024)));
        assert_eq!(
            out.get("tags"),
            Some(&ConstraintValue::Tags(vec!["foo".into(), "bar".into()]))
        );
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn worded_integers_drop_and_zero_is_kept() {
        let out = prepare_constraints(&map(json!({"cpu-power": "four", "mem": 2000})));
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("mem"), Some(&ConstraintValue::Integer(2000)));

        let out = prepare_constraints(&map(json!({"root-disk": "0", "mem": 0})));
        assert_eq!(out.get("root-disk"), Some(&ConstraintValue::Integer(0)));
        assert_eq!(out.get("mem"), Some(&ConstraintValue::Integer(0)));
    }

    #[test]
    fn tags_collapse_inner_whitespace() {
        let out = prepare_constraints(&map(json!({"tags": "first tag, second  tag"})));
        assert_eq!(
            out.get("tags"),
            Some(&ConstraintValue::Tags(vec!["first-tag".into(), "second-tag".into()]))
        );
    }

    #[test]
    fn unknown_constraint_names_drop() {
        let out = prepare_constraints(&map(json!({"zones": "a", "arch": "arm64"})));
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("arch"), Some(&ConstraintValue::Text("arm64".into())));
    }

    #[test]
    fn unparseable_integers_and_blank_strings_drop() {
        let out = prepare_constraints(&map(json!({
            "mem": "four",
            "root-disk": 800,
            "arch": "   ",
            "tags": " , ,",
        })));
        assert_eq!(out.get("mem"), None);
        assert_eq!(out.get("root-disk"), Some(&ConstraintValue::Integer(800)));
        assert_eq!(out.get("arch"), None);
        assert_eq!(out.get("tags"), Some(&ConstraintValue::Tags(vec![])));
    }

    #[test]
    fn lenient_integer_parse() {
        assert_eq!(parse_leading_integer(" 12GB"), Some(12));
        assert_eq!(parse_leading_integer("-3"), Some(-3));
        assert_eq!(parse_leading_integer("GB"), None);
    }

    #[test]
    fn placement_rules() {
        assert_eq!(
            parse_placement("lxc:2"),
            Some(Placement {
                scope: "lxc".into(),
                directive: "2".into()
            })
        );
        assert_eq!(
            parse_placement("42"),
            Some(Placement {
                scope: MACHINE_SCOPE.into(),
                directive: "42".into()
            })
        );
        assert_eq!(
            parse_placement("kvm"),
            Some(Placement {
                scope: "kvm".into(),
                directive: String::new()
            })
        );
        assert_eq!(parse_placement(""), None);
    }

    #[test]
    fn stringify_keeps_nulls_and_bare_strings() {
        let input = json!({"a": 42, "b": true, "c": "x", "d": null});
        let Value::Object(input) = input else { unreachable!() };
        let out = stringify_values(&input);
        assert_eq!(
            Value::Object(out),
            json!({"a": "42", "b": "true", "c": "x", "d": null})
        );
    }

    #[test]
    fn relation_key_orders_requirer_first() {
        let endpoints = vec![
            RelationEndpoint {
                application: "mysql".into(),
                name: "db".into(),
                role: "provider".into(),
                ..RelationEndpoint::default()
            },
            RelationEndpoint {
                application: "wordpress".into(),
                name: "db".into(),
                role: "requirer".into(),
                ..RelationEndpoint::default()
            },
        ];
        assert_eq!(relation_key(&endpoints), "wordpress:db mysql:db");
    }

    #[test]
    fn offer_url_defaults_from_user_and_model() {
        let req = OfferRequest {
            application_name: "django".into(),
            user: "user-admin".into(),
            model_name: "ec2".into(),
            ..OfferRequest::default()
        };
        assert_eq!(req.resolved_url(), "local:/u/admin/ec2/django");
        assert_eq!(req.allowed_user_tags(), vec!["user-public".to_owned()]);
    }

    #[test]
    fn tags() {
        assert_eq!(entity_tag("application", "django"), "application-django");
        assert_eq!(user_tag("admin"), "user-admin");
        assert_eq!(user_tag("user-admin"), "user-admin");
    }
}
