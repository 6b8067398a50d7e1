use kdl::{KdlDocument, KdlNode, KdlValue};

use crate::errors::PolicyError;
use crate::policy::types::*;

/// Parse a KDL policy document into unresolved statements, in document order.
///
/// ```kdl
/// user "alice" uidnumber=1001 {
///     public_keys {
///         - "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5 alice@laptop"
///     }
/// }
/// layer "ops"
/// host "web1" owner="user:alice"
/// grant role="layer:ops" member="host:web1"
/// ```
/// Kinds declared by their own statements. Grants decide whether to wire a
/// host's privileges from the kind alone, so a generic `role`/`resource` may
/// not claim one of these.
const STATEMENT_KINDS: [&str; 10] = [
    "layer",
    "host",
    "user",
    "group",
    "policy",
    "host_factory",
    "variable",
    "webservice",
    "deputy",
    "@",
];

pub fn parse_kdl_document(source: &str) -> Result<Vec<Statement>, PolicyError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| PolicyError::KdlParse(e.to_string()))?;

    parse_statements(doc.nodes())
}

fn parse_statements(nodes: &[KdlNode]) -> Result<Vec<Statement>, PolicyError> {
    nodes.iter().map(parse_statement).collect()
}

fn parse_statement(node: &KdlNode) -> Result<Statement, PolicyError> {
    let statement = match node.name().value() {
        "role" => {
            expect_children(node, &[])?;
            let kind = generic_kind(node, "role")?;
            Statement::Role(Role {
                id: declared_id(node, kind)?,
            })
        }
        "resource" => {
            expect_children(node, &["annotations"])?;
            let kind = generic_kind(node, "resource")?;
            Statement::Resource(resource(node, kind)?)
        }
        "variable" => {
            expect_children(node, &["annotations"])?;
            Statement::Variable(resource(node, "variable")?)
        }
        "webservice" => {
            expect_children(node, &["annotations"])?;
            Statement::Record(record(node, "webservice")?)
        }
        "host" => {
            expect_children(node, &["annotations"])?;
            Statement::Host(Host {
                record: record(node, "host")?,
            })
        }
        "layer" => {
            expect_children(node, &["annotations"])?;
            Statement::Layer(Layer {
                record: record(node, "layer")?,
            })
        }
        "group" => {
            expect_children(node, &["annotations"])?;
            Statement::Group(Group {
                record: record(node, "group")?,
                gidnumber: int_prop(node, "gidnumber")?,
            })
        }
        "user" => {
            expect_children(node, &["annotations", "public_keys"])?;
            Statement::User(User {
                record: record(node, "user")?,
                uidnumber: int_prop(node, "uidnumber")?,
                public_keys: dash_list(node, "public_keys")?,
            })
        }
        "host_factory" => {
            expect_children(node, &["annotations", "layers"])?;
            let layers = dash_list(node, "layers")?
                .iter()
                .map(|l| reference(l, Some("layer")))
                .collect::<Result<Vec<_>, _>>()?;
            Statement::HostFactory(HostFactory {
                resource: resource(node, "host_factory")?,
                layers,
            })
        }
        "grant" => {
            expect_children(node, &["roles", "members"])?;
            Statement::Grant(grant(node)?)
        }
        "permit" => {
            expect_children(node, &["privileges", "resources", "roles"])?;
            Statement::Permit(permit(node)?)
        }
        "policy" => {
            let body: Vec<KdlNode> = node
                .children()
                .map(|c| {
                    c.nodes()
                        .iter()
                        .filter(|n| n.name().value() != "annotations")
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            Statement::Policy(Policy {
                record: record(node, "policy")?,
                body: parse_statements(&body)?,
            })
        }
        other => {
            return Err(PolicyError::InvalidPolicy(format!(
                "unknown statement `{other}` (expected role, resource, variable, webservice, host, layer, group, user, host_factory, grant, permit or policy)"
            )));
        }
    };

    Ok(statement)
}

fn grant(node: &KdlNode) -> Result<Grant, PolicyError> {
    let default_admin = bool_prop(node, "admin")?.unwrap_or(false);

    let mut roles = Vec::new();
    if let Some(role) = string_prop(node, "role")? {
        roles.push(reference(role, None)?);
    }
    for role in dash_list(node, "roles")? {
        roles.push(reference(&role, None)?);
    }

    let mut members = Vec::new();
    if let Some(member) = string_prop(node, "member")? {
        members.push(Member {
            role: reference(member, None)?,
            admin: default_admin,
        });
    }
    for entry in dash_nodes(node, "members") {
        let member = first_string_arg(entry).ok_or_else(|| {
            PolicyError::InvalidPolicy("grant member requires a string argument".into())
        })?;
        members.push(Member {
            role: reference(&member, None)?,
            admin: bool_prop(entry, "admin")?.unwrap_or(default_admin),
        });
    }

    if roles.is_empty() || members.is_empty() {
        return Err(PolicyError::InvalidPolicy(
            "grant requires at least one role and one member (e.g. grant role=\"layer:ops\" member=\"host:web1\")".into(),
        ));
    }

    Ok(Grant { roles, members })
}

fn permit(node: &KdlNode) -> Result<Permit, PolicyError> {
    let mut privileges = dash_list(node, "privileges")?;
    if let Some(privilege) = string_prop(node, "privilege")? {
        privileges.insert(0, privilege.to_string());
    }

    let mut resources = Vec::new();
    if let Some(resource) = string_prop(node, "resource")? {
        resources.push(reference(resource, None)?);
    }
    for resource in dash_list(node, "resources")? {
        resources.push(reference(&resource, None)?);
    }

    let mut roles = Vec::new();
    if let Some(role) = string_prop(node, "role")? {
        roles.push(reference(role, None)?);
    }
    for role in dash_list(node, "roles")? {
        roles.push(reference(&role, None)?);
    }

    if privileges.is_empty() || resources.is_empty() || roles.is_empty() {
        return Err(PolicyError::InvalidPolicy(
            "permit requires privileges, resources and roles; there is no default privilege set"
                .into(),
        ));
    }

    Ok(Permit {
        resources,
        privileges,
        roles,
    })
}

/// `kind=` of a generic role or resource.
fn generic_kind<'a>(node: &'a KdlNode, default: &'a str) -> Result<&'a str, PolicyError> {
    let kind = string_prop(node, "kind")?.unwrap_or(default);
    if kind.is_empty() || kind.contains(':') {
        return Err(PolicyError::InvalidPolicy(format!(
            "invalid kind `{kind}` on {} statement",
            node.name().value()
        )));
    }
    if STATEMENT_KINDS.contains(&kind) {
        return Err(PolicyError::InvalidPolicy(format!(
            "kind `{kind}` is reserved and cannot be declared by a `{}` statement",
            node.name().value()
        )));
    }
    Ok(kind)
}

fn record(node: &KdlNode, kind: &str) -> Result<Record, PolicyError> {
    Ok(Record {
        id: declared_id(node, kind)?,
        owner: owner(node)?,
        annotations: annotations(node)?,
    })
}

fn resource(node: &KdlNode, kind: &str) -> Result<Resource, PolicyError> {
    Ok(Resource {
        id: declared_id(node, kind)?,
        owner: owner(node)?,
        annotations: annotations(node)?,
    })
}

fn declared_id(node: &KdlNode, kind: &str) -> Result<ObjectId, PolicyError> {
    let name = node.name().value();
    let id = first_string_arg(node).ok_or_else(|| {
        PolicyError::InvalidPolicy(format!(
            "{name} statement requires an id argument (e.g. {name} \"web1\")"
        ))
    })?;
    if id.is_empty() {
        return Err(PolicyError::InvalidPolicy(format!("{name} id must not be empty")));
    }
    Ok(ObjectId::new("", kind, id))
}

fn owner(node: &KdlNode) -> Result<Option<ObjectId>, PolicyError> {
    string_prop(node, "owner")?
        .map(|o| reference(o, None))
        .transpose()
}

/// Parse `kind:id`, or a bare id when the position implies the kind.
fn reference(s: &str, default_kind: Option<&str>) -> Result<ObjectId, PolicyError> {
    if let Some(id) = ObjectId::parse_reference(s) {
        return Ok(id);
    }
    match default_kind {
        Some(kind) if !s.is_empty() && !s.contains(':') => Ok(ObjectId::new("", kind, s)),
        _ => Err(PolicyError::InvalidPolicy(format!(
            "invalid reference `{s}` (expected \"kind:id\", e.g. \"layer:ops\")"
        ))),
    }
}

/// `annotations { "name" "value" }`; duplicate names are kept in order.
fn annotations(node: &KdlNode) -> Result<Vec<Annotation>, PolicyError> {
    let Some(block) = child(node, "annotations") else {
        return Ok(Vec::new());
    };
    let Some(children) = block.children() else {
        return Ok(Vec::new());
    };

    children
        .nodes()
        .iter()
        .map(|n| {
            let name = n.name().value();
            let value = n
                .entries()
                .iter()
                .find(|e| e.name().is_none())
                .and_then(|e| scalar_string(e.value()))
                .ok_or_else(|| {
                    PolicyError::InvalidPolicy(format!("annotation `{name}` requires a value"))
                })?;
            Ok(Annotation::new(name, value))
        })
        .collect()
}

fn expect_children(node: &KdlNode, allowed: &[&str]) -> Result<(), PolicyError> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for c in children.nodes() {
        let name = c.name().value();
        if !allowed.contains(&name) {
            return Err(PolicyError::InvalidPolicy(format!(
                "unexpected child `{name}` in {} statement",
                node.name().value()
            )));
        }
    }
    Ok(())
}

fn child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|n| n.name().value() == name)
}

fn dash_nodes<'a>(node: &'a KdlNode, name: &str) -> Vec<&'a KdlNode> {
    child(node, name)
        .and_then(|c| c.children())
        .map(|c| {
            c.nodes()
                .iter()
                .filter(|n| n.name().value() == "-")
                .collect()
        })
        .unwrap_or_default()
}

/// Extract a dash list child, e.g. `layers { - "ops" }`.
fn dash_list(node: &KdlNode, name: &str) -> Result<Vec<String>, PolicyError> {
    dash_nodes(node, name)
        .into_iter()
        .map(|n| {
            first_string_arg(n).ok_or_else(|| {
                PolicyError::InvalidPolicy(format!("entries of `{name}` must be strings"))
            })
        })
        .collect()
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn string_prop<'a>(node: &'a KdlNode, key: &str) -> Result<Option<&'a str>, PolicyError> {
    match node.get(key) {
        None => Ok(None),
        Some(v) => v.as_string().map(Some).ok_or_else(|| {
            PolicyError::InvalidPolicy(format!(
                "`{key}` on {} must be a string",
                node.name().value()
            ))
        }),
    }
}

fn int_prop(node: &KdlNode, key: &str) -> Result<Option<i64>, PolicyError> {
    match node.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_integer()
            .and_then(|i| i64::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| {
                PolicyError::InvalidPolicy(format!(
                    "`{key}` on {} must be an integer",
                    node.name().value()
                ))
            }),
    }
}

fn bool_prop(node: &KdlNode, key: &str) -> Result<Option<bool>, PolicyError> {
    match node.get(key) {
        None => Ok(None),
        Some(v) => v.as_bool().map(Some).ok_or_else(|| {
            PolicyError::InvalidPolicy(format!(
                "`{key}` on {} must be #true or #false",
                node.name().value()
            ))
        }),
    }
}

fn scalar_string(value: &KdlValue) -> Option<String> {
    if let Some(s) = value.as_string() {
        Some(s.to_string())
    } else if let Some(i) = value.as_integer() {
        Some(i.to_string())
    } else {
        value.as_bool().map(|b| b.to_string())
    }
}
