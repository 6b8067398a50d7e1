use crate::policy::types::*;

/// Id of the administrative role that owns top-level statements.
pub fn admin_role_id(account: &str) -> ObjectId {
    ObjectId::new(account, "user", "admin")
}

struct Scope<'a> {
    account: &'a str,
    /// Local id of the enclosing policy, if any
    namespace: Option<String>,
    owner: ObjectId,
}

impl Scope<'_> {
    fn qualify_local(&self, id: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{id}"),
            None => id.to_string(),
        }
    }

    /// Qualify a declared id into this scope's account and namespace.
    fn declare(&self, id: &ObjectId) -> ObjectId {
        ObjectId::new(self.account, &id.kind, self.qualify_local(&id.id))
    }

    /// References are relative to the enclosing policy unless they start with `/`.
    fn reference(&self, id: &ObjectId) -> ObjectId {
        let local = match id.id.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => self.qualify_local(&id.id),
        };
        ObjectId::new(self.account, &id.kind, local)
    }

    fn owner(&self, owner: &Option<ObjectId>) -> Option<ObjectId> {
        Some(match owner {
            Some(o) => self.reference(o),
            None => self.owner.clone(),
        })
    }
}

/// Qualify every id and reference with `account`, namespace statements under
/// their enclosing policy, and give unowned statements a default owner: the
/// enclosing policy's role, or the account's admin role at the top level.
pub fn resolve(statements: Vec<Statement>, account: &str) -> Vec<Statement> {
    let scope = Scope {
        account,
        namespace: None,
        owner: admin_role_id(account),
    };
    resolve_in(statements, &scope)
}

fn resolve_in(statements: Vec<Statement>, scope: &Scope<'_>) -> Vec<Statement> {
    statements
        .into_iter()
        .map(|s| resolve_statement(s, scope))
        .collect()
}

fn resolve_record(record: Record, scope: &Scope<'_>) -> Record {
    Record {
        id: scope.declare(&record.id),
        owner: scope.owner(&record.owner),
        annotations: record.annotations,
    }
}

fn resolve_resource(resource: Resource, scope: &Scope<'_>) -> Resource {
    Resource {
        id: scope.declare(&resource.id),
        owner: scope.owner(&resource.owner),
        annotations: resource.annotations,
    }
}

fn resolve_statement(statement: Statement, scope: &Scope<'_>) -> Statement {
    match statement {
        Statement::Role(r) => Statement::Role(Role {
            id: scope.declare(&r.id),
        }),
        Statement::Resource(r) => Statement::Resource(resolve_resource(r, scope)),
        Statement::Variable(v) => Statement::Variable(resolve_resource(v, scope)),
        Statement::Record(r) => Statement::Record(resolve_record(r, scope)),
        Statement::Host(h) => Statement::Host(Host {
            record: resolve_record(h.record, scope),
        }),
        Statement::Layer(l) => Statement::Layer(Layer {
            record: resolve_record(l.record, scope),
        }),
        Statement::Group(g) => Statement::Group(Group {
            record: resolve_record(g.record, scope),
            gidnumber: g.gidnumber,
        }),
        Statement::User(u) => Statement::User(User {
            record: resolve_record(u.record, scope),
            uidnumber: u.uidnumber,
            public_keys: u.public_keys,
        }),
        Statement::HostFactory(f) => Statement::HostFactory(HostFactory {
            resource: resolve_resource(f.resource, scope),
            layers: f.layers.iter().map(|l| scope.reference(l)).collect(),
        }),
        Statement::Grant(g) => Statement::Grant(Grant {
            roles: g.roles.iter().map(|r| scope.reference(r)).collect(),
            members: g
                .members
                .into_iter()
                .map(|m| Member {
                    role: scope.reference(&m.role),
                    admin: m.admin,
                })
                .collect(),
        }),
        Statement::Permit(p) => Statement::Permit(Permit {
            resources: p.resources.iter().map(|r| scope.reference(r)).collect(),
            privileges: p.privileges,
            roles: p.roles.iter().map(|r| scope.reference(r)).collect(),
        }),
        Statement::Policy(p) => {
            let record = resolve_record(p.record, scope);
            let inner = Scope {
                account: scope.account,
                namespace: Some(record.id.id.clone()),
                owner: record.id.clone(),
            };
            let body = resolve_in(p.body, &inner);
            Statement::Policy(Policy { record, body })
        }
    }
}
