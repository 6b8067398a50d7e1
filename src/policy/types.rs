use std::fmt;

/// Identity of a role or resource: `account:kind:id`, e.g. `acme:host:web1`.
///
/// Statements read from a policy document carry an empty account until the
/// resolver qualifies them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub account: String,
    pub kind: String,
    pub id: String,
}

impl ObjectId {
    pub fn new(account: impl Into<String>, kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Parse a fully qualified `account:kind:id`. The id part may itself contain `:`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let account = parts.next()?;
        let kind = parts.next()?;
        let id = parts.next()?;
        if account.is_empty() || kind.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::new(account, kind, id))
    }

    /// Parse a `kind:id` reference as written in a policy document.
    pub fn parse_reference(s: &str) -> Option<Self> {
        let (kind, id) = s.split_once(':')?;
        if kind.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::new("", kind, id))
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.account, self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

impl Annotation {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Role,
    Resource,
    Variable,
    Record,
    Host,
    Layer,
    Group,
    User,
    HostFactory,
    Grant,
    Permit,
    Policy,
}

impl StatementKind {
    /// The `kind` component given to ids declared by this statement.
    pub fn id_kind(&self) -> &'static str {
        match self {
            StatementKind::Role => "role",
            StatementKind::Resource => "resource",
            StatementKind::Variable => "variable",
            StatementKind::Record => "webservice",
            StatementKind::Host => "host",
            StatementKind::Layer => "layer",
            StatementKind::Group => "group",
            StatementKind::User => "user",
            StatementKind::HostFactory => "host_factory",
            StatementKind::Grant => "grant",
            StatementKind::Permit => "permit",
            StatementKind::Policy => "policy",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Record => "record",
            StatementKind::HostFactory => "host factory",
            other => other.id_kind(),
        };
        f.write_str(name)
    }
}

// ---------- Statements ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: ObjectId,
}

/// A resource declaration; also the shape of `variable` statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: ObjectId,
    /// Filled in by the resolver when the document leaves it out
    pub owner: Option<ObjectId>,
    pub annotations: Vec<Annotation>,
}

pub type Variable = Resource;

/// Something that is both a role and a resource under the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: ObjectId,
    pub owner: Option<ObjectId>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub record: Record,
    pub gidnumber: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub record: Record,
    pub uidnumber: Option<i64>,
    /// OpenSSH public keys, e.g. `ssh-ed25519 AAAA... alice@laptop`
    pub public_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFactory {
    pub resource: Resource,
    pub layers: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub role: ObjectId,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub roles: Vec<ObjectId>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permit {
    pub resources: Vec<ObjectId>,
    pub privileges: Vec<String>,
    pub roles: Vec<ObjectId>,
}

/// A nested policy: its own role and resource, then its body in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub record: Record,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Role(Role),
    Resource(Resource),
    Variable(Variable),
    Record(Record),
    Host(Host),
    Layer(Layer),
    Group(Group),
    User(User),
    HostFactory(HostFactory),
    Grant(Grant),
    Permit(Permit),
    Policy(Policy),
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Role(_) => StatementKind::Role,
            Statement::Resource(_) => StatementKind::Resource,
            Statement::Variable(_) => StatementKind::Variable,
            Statement::Record(_) => StatementKind::Record,
            Statement::Host(_) => StatementKind::Host,
            Statement::Layer(_) => StatementKind::Layer,
            Statement::Group(_) => StatementKind::Group,
            Statement::User(_) => StatementKind::User,
            Statement::HostFactory(_) => StatementKind::HostFactory,
            Statement::Grant(_) => StatementKind::Grant,
            Statement::Permit(_) => StatementKind::Permit,
            Statement::Policy(_) => StatementKind::Policy,
        }
    }

    /// The id this statement declares, if it declares one.
    pub fn id(&self) -> Option<&ObjectId> {
        match self {
            Statement::Role(r) => Some(&r.id),
            Statement::Resource(r) | Statement::Variable(r) => Some(&r.id),
            Statement::Record(r) => Some(&r.id),
            Statement::Host(h) => Some(&h.record.id),
            Statement::Layer(l) => Some(&l.record.id),
            Statement::Group(g) => Some(&g.record.id),
            Statement::User(u) => Some(&u.record.id),
            Statement::HostFactory(f) => Some(&f.resource.id),
            Statement::Policy(p) => Some(&p.record.id),
            Statement::Grant(_) | Statement::Permit(_) => None,
        }
    }

    /// Short description used in error context.
    pub fn label(&self) -> String {
        match self {
            Statement::Grant(g) => join_ids(&g.roles),
            Statement::Permit(p) => format!("{} on {}", p.privileges.join(","), join_ids(&p.resources)),
            other => other.id().map(ToString::to_string).unwrap_or_default(),
        }
    }
}

fn join_ids(ids: &[ObjectId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}
