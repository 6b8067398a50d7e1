use possum::policy::types::{Annotation, ObjectId, Record};

pub const ACCOUNT: &str = "acme";

/// Resolved id in the test account
pub fn oid(kind: &str, id: &str) -> ObjectId {
    ObjectId::new(ACCOUNT, kind, id)
}

#[allow(dead_code)]
pub fn admin() -> ObjectId {
    oid("user", "admin")
}

/// Builder for resolved records owned by the admin role unless told otherwise
pub struct RecordBuilder {
    id: ObjectId,
    owner: Option<ObjectId>,
    annotations: Vec<Annotation>,
}

#[allow(dead_code)]
impl RecordBuilder {
    pub fn new(kind: &str, id: &str) -> Self {
        Self {
            id: oid(kind, id),
            owner: Some(admin()),
            annotations: Vec::new(),
        }
    }

    pub fn owned_by(mut self, owner: ObjectId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn unowned(mut self) -> Self {
        self.owner = None;
        self
    }

    pub fn annotate(mut self, name: &str, value: &str) -> Self {
        self.annotations.push(Annotation::new(name, value));
        self
    }

    pub fn build(self) -> Record {
        Record {
            id: self.id,
            owner: self.owner,
            annotations: self.annotations,
        }
    }
}
