// Integration tests for how each statement kind materializes into the graph.
//
// Statements here are built already resolved and created directly against a
// migrated SQLite database, without going through the loader.

mod helpers;

use helpers::builders::{admin, oid, ACCOUNT};
use helpers::db::seed_admin;
use helpers::graph::{permission_pairs, resource_ids_under, role_ids, transitive_roles};
use helpers::{RecordBuilder, TestDb};
use possum::errors::PolicyError;
use possum::policy::types::*;
use possum::policy::{Create, ResourceCreatable, RoleCreatable};
use possum::storage;

#[tokio::test]
async fn test_record_creates_role_then_owned_resource() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    let record = RecordBuilder::new("webservice", "api")
        .annotate("description", "public API")
        .annotate("tier", "edge")
        .build();

    assert!(record.role(db).await.unwrap().is_none());
    assert!(record.resource(db).await.unwrap().is_none());

    record.create(db).await.expect("Failed to create record");

    let role = record.role(db).await.unwrap().expect("Role not created");
    assert_eq!(role.id, "acme:webservice:api");

    let resource = record.resource(db).await.unwrap().expect("Resource not created");
    assert_eq!(resource.owner_id, "acme:user:admin");

    let annotations = storage::annotations_of(db, "acme:webservice:api")
        .await
        .unwrap();
    assert_eq!(annotations.len(), 2);
    assert_eq!(annotations[0].name, "description");
    assert_eq!(annotations[1].value, "edge");
}

#[tokio::test]
async fn test_resource_with_missing_owner_creates_no_rows() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();

    let variable = Resource {
        id: oid("variable", "db-password"),
        owner: Some(oid("group", "ghosts")),
        annotations: vec![Annotation::new("kind", "password")],
    };

    let err = variable.create(db).await.unwrap_err();
    assert!(matches!(err, PolicyError::ReferenceNotFound { id } if id == "acme:group:ghosts"));

    assert!(variable.resource(db).await.unwrap().is_none());
    assert!(storage::annotations_of(db, "acme:variable:db-password")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unresolved_resource_is_rejected() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();

    let record = RecordBuilder::new("host", "web1").unowned().build();
    let err = record.create_resource(db).await.unwrap_err();
    assert!(matches!(err, PolicyError::InvalidPolicy(_)));
}

#[tokio::test]
async fn test_duplicate_role_statement() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();

    let role = Role {
        id: oid("role", "alice"),
    };
    role.create(db).await.unwrap();

    let err = Statement::Role(role).create(db).await.unwrap_err();
    match &err {
        PolicyError::Statement { kind, id, .. } => {
            assert_eq!(*kind, StatementKind::Role);
            assert_eq!(id, "acme:role:alice");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(err.root(), PolicyError::DuplicateEntity { .. }));
}

#[tokio::test]
async fn test_layer_creates_automatic_role_chain() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    let layer = Layer {
        record: RecordBuilder::new("layer", "ops").build(),
    };
    layer.create(db).await.expect("Failed to create layer");

    for name in ["observe", "use_host", "admin_host"] {
        let role = layer
            .automatic_role(db, name)
            .await
            .expect("Automatic role missing");
        assert_eq!(role.id, format!("acme:@:layer/ops/{name}"));
    }

    // Holding admin_host implies use_host and observe
    let held = transitive_roles(db, "acme:@:layer/ops/admin_host").await;
    assert!(held.contains("acme:@:layer/ops/use_host"));
    assert!(held.contains("acme:@:layer/ops/observe"));

    // ...but not the other way around
    let held = transitive_roles(db, "acme:@:layer/ops/observe").await;
    assert!(held.is_empty());

    storage::create_role(db, "acme:user:carol").await.unwrap();
    storage::grant_role(db, "acme:@:layer/ops/admin_host", "acme:user:carol", false)
        .await
        .unwrap();
    let held = transitive_roles(db, "acme:user:carol").await;
    assert_eq!(held.len(), 3);
}

#[tokio::test]
async fn test_automatic_role_before_create_fails() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();

    let layer = Layer {
        record: RecordBuilder::new("layer", "ops").build(),
    };
    let err = layer.automatic_role(db, "observe").await.unwrap_err();
    assert!(
        matches!(err, PolicyError::ReferenceNotFound { id } if id == "acme:@:layer/ops/observe")
    );
}

#[tokio::test]
async fn test_group_and_user_numeric_ids() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    Group {
        record: RecordBuilder::new("group", "devs").build(),
        gidnumber: Some(2001),
    }
    .create(db)
    .await
    .unwrap();
    User {
        record: RecordBuilder::new("user", "alice").build(),
        uidnumber: Some(1001),
        public_keys: vec![],
    }
    .create(db)
    .await
    .unwrap();
    Group {
        record: RecordBuilder::new("group", "plain").build(),
        gidnumber: None,
    }
    .create(db)
    .await
    .unwrap();

    let devs = storage::require_role(db, "acme:group:devs").await.unwrap();
    assert_eq!(devs.gidnumber, Some(2001));
    let alice = storage::require_role(db, "acme:user:alice").await.unwrap();
    assert_eq!(alice.uidnumber, Some(1001));
    let plain = storage::require_role(db, "acme:group:plain").await.unwrap();
    assert!(plain.gidnumber.is_none());
}

#[tokio::test]
async fn test_user_public_keys_become_secret_variables() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;
    storage::create_role(db, "acme:group:security").await.unwrap();

    let keys = vec![
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMq alice@laptop".to_string(),
        "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ alice@desktop".to_string(),
    ];
    let user = User {
        record: RecordBuilder::new("user", "alice")
            .owned_by(oid("group", "security"))
            .build(),
        uidnumber: None,
        public_keys: keys.clone(),
    };
    user.create(db).await.expect("Failed to create user");

    assert_eq!(
        resource_ids_under(db, "acme:variable:").await,
        vec![
            "acme:variable:public_keys/alice/alice@desktop".to_string(),
            "acme:variable:public_keys/alice/alice@laptop".to_string(),
        ]
    );
    assert_eq!(
        resource_ids_under(db, "acme:variable:public_keys/alice/").await.len(),
        keys.len()
    );

    for (key, name) in keys.iter().zip(["alice@laptop", "alice@desktop"]) {
        let resource_id = format!("acme:variable:public_keys/alice/{name}");

        let resource = storage::require_resource(db, &resource_id).await.unwrap();
        assert_eq!(resource.owner_id, "acme:group:security");

        let secret = storage::get_secret(db, &resource_id)
            .await
            .unwrap()
            .expect("Secret not stored");
        assert_eq!(&secret.value, key);

        let annotations = storage::annotations_of(db, &resource_id).await.unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].name, "possum/variable/kind");
        assert_eq!(annotations[0].value, "SSH public key");

        assert_eq!(
            permission_pairs(db, &resource_id).await,
            vec![
                ("execute".to_string(), "acme:user:alice".to_string()),
                ("read".to_string(), "acme:user:alice".to_string()),
            ]
        );
    }
}

#[tokio::test]
async fn test_user_duplicate_key_name_fails() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    let user = User {
        record: RecordBuilder::new("user", "bob").build(),
        uidnumber: None,
        public_keys: vec![
            "ssh-ed25519 AAAA1 bob@laptop".to_string(),
            "ssh-ed25519 AAAA2 bob@laptop".to_string(),
        ],
    };
    let err = user.create(db).await.unwrap_err();
    assert!(matches!(err, PolicyError::DuplicateEntity { id } if id == "acme:variable:public_keys/bob/bob@laptop"));
}

#[tokio::test]
async fn test_host_factory_deputy_joins_layers() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    for name in ["ops", "db"] {
        Layer {
            record: RecordBuilder::new("layer", name).build(),
        }
        .create(db)
        .await
        .unwrap();
    }

    let factory = HostFactory {
        resource: Resource {
            id: oid("host_factory", "web"),
            owner: Some(admin()),
            annotations: vec![],
        },
        layers: vec![oid("layer", "ops"), oid("layer", "db")],
    };
    factory.create(db).await.expect("Failed to create host factory");

    assert!(factory.resource(db).await.unwrap().is_some());
    let held = transitive_roles(db, "acme:deputy:web").await;
    assert_eq!(
        held.into_iter().collect::<Vec<_>>(),
        vec!["acme:layer:db".to_string(), "acme:layer:ops".to_string()]
    );
}

#[tokio::test]
async fn test_host_factory_missing_layer() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    let factory = HostFactory {
        resource: Resource {
            id: oid("host_factory", "web"),
            owner: Some(admin()),
            annotations: vec![],
        },
        layers: vec![oid("layer", "missing")],
    };
    let err = factory.create(db).await.unwrap_err();
    assert!(matches!(err, PolicyError::ReferenceNotFound { id } if id == "acme:layer:missing"));
}

#[tokio::test]
async fn test_grant_layer_to_host_wires_host_permissions() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    Layer {
        record: RecordBuilder::new("layer", "ops").build(),
    }
    .create(db)
    .await
    .unwrap();
    Host {
        record: RecordBuilder::new("host", "web1").build(),
    }
    .create(db)
    .await
    .unwrap();

    Grant {
        roles: vec![oid("layer", "ops")],
        members: vec![Member {
            role: oid("host", "web1"),
            admin: false,
        }],
    }
    .create(db)
    .await
    .expect("Failed to create grant");

    let memberships = storage::memberships_of_member(db, "acme:host:web1")
        .await
        .unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].role_id, "acme:layer:ops");
    assert!(!memberships[0].admin_option);

    assert_eq!(
        permission_pairs(db, "acme:host:web1").await,
        vec![
            (
                "execute".to_string(),
                "acme:@:layer/ops/use_host".to_string()
            ),
            ("read".to_string(), "acme:@:layer/ops/observe".to_string()),
            (
                "update".to_string(),
                "acme:@:layer/ops/admin_host".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_grant_between_plain_roles_adds_no_permissions() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    for name in ["devs", "ops"] {
        Group {
            record: RecordBuilder::new("group", name).build(),
            gidnumber: None,
        }
        .create(db)
        .await
        .unwrap();
    }
    for name in ["alice", "bob"] {
        User {
            record: RecordBuilder::new("user", name).build(),
            uidnumber: None,
            public_keys: vec![],
        }
        .create(db)
        .await
        .unwrap();
    }

    Grant {
        roles: vec![oid("group", "devs"), oid("group", "ops")],
        members: vec![
            Member {
                role: oid("user", "alice"),
                admin: true,
            },
            Member {
                role: oid("user", "bob"),
                admin: false,
            },
        ],
    }
    .create(db)
    .await
    .unwrap();

    for group in ["acme:group:devs", "acme:group:ops"] {
        let memberships = storage::memberships_of_role(db, group).await.unwrap();
        assert_eq!(memberships.len(), 2);
        assert_eq!(memberships[0].member_id, "acme:user:alice");
        assert!(memberships[0].admin_option);
        assert_eq!(memberships[1].member_id, "acme:user:bob");
        assert!(!memberships[1].admin_option);
    }
    assert!(storage::permissions_on(db, "acme:user:alice")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_grant_missing_member() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;
    storage::create_role(db, "acme:group:devs").await.unwrap();

    let err = Grant {
        roles: vec![oid("group", "devs")],
        members: vec![Member {
            role: oid("user", "mallory"),
            admin: false,
        }],
    }
    .create(db)
    .await
    .unwrap_err();
    assert!(matches!(err, PolicyError::ReferenceNotFound { id } if id == "acme:user:mallory"));
}

#[tokio::test]
async fn test_permit_cross_product() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;
    storage::create_role(db, "acme:user:alice").await.unwrap();
    for name in ["db1", "db2"] {
        Resource {
            id: oid("variable", name),
            owner: Some(admin()),
            annotations: vec![],
        }
        .create(db)
        .await
        .unwrap();
    }

    Permit {
        resources: vec![oid("variable", "db1"), oid("variable", "db2")],
        privileges: vec!["read".to_string(), "write".to_string()],
        roles: vec![oid("user", "alice")],
    }
    .create(db)
    .await
    .unwrap();

    for resource in ["acme:variable:db1", "acme:variable:db2"] {
        assert_eq!(
            permission_pairs(db, resource).await,
            vec![
                ("read".to_string(), "acme:user:alice".to_string()),
                ("write".to_string(), "acme:user:alice".to_string()),
            ]
        );
    }
}

#[tokio::test]
async fn test_permit_missing_role() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;
    Resource {
        id: oid("variable", "db1"),
        owner: Some(admin()),
        annotations: vec![],
    }
    .create(db)
    .await
    .unwrap();

    let err = Permit {
        resources: vec![oid("variable", "db1")],
        privileges: vec!["read".to_string()],
        roles: vec![oid("user", "nobody")],
    }
    .create(db)
    .await
    .unwrap_err();
    assert!(matches!(err, PolicyError::ReferenceNotFound { id } if id == "acme:user:nobody"));
}

#[tokio::test]
async fn test_nested_policy_creates_body_in_order() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    let prod = oid("policy", "prod");
    let policy = Statement::Policy(Policy {
        record: RecordBuilder::new("policy", "prod").build(),
        body: vec![
            Statement::Layer(Layer {
                record: RecordBuilder::new("layer", "prod/ops")
                    .owned_by(prod.clone())
                    .build(),
            }),
            Statement::Policy(Policy {
                record: RecordBuilder::new("policy", "prod/db")
                    .owned_by(prod.clone())
                    .build(),
                body: vec![Statement::Variable(Resource {
                    id: oid("variable", "prod/db/password"),
                    owner: Some(oid("policy", "prod/db")),
                    annotations: vec![],
                })],
            }),
        ],
    });
    policy.create(db).await.expect("Failed to create policy");

    let layer = storage::require_resource(db, "acme:layer:prod/ops").await.unwrap();
    assert_eq!(layer.owner_id, "acme:policy:prod");
    let password = storage::require_resource(db, "acme:variable:prod/db/password")
        .await
        .unwrap();
    assert_eq!(password.owner_id, "acme:policy:prod/db");
}

#[tokio::test]
async fn test_nested_policy_failure_stops_remaining_statements() {
    let test_db = TestDb::new().await;
    let db = test_db.connection();
    seed_admin(db, ACCOUNT).await;

    let policy = Statement::Policy(Policy {
        record: RecordBuilder::new("policy", "prod").build(),
        body: vec![
            Statement::Role(Role {
                id: oid("role", "first"),
            }),
            Statement::Grant(Grant {
                roles: vec![oid("role", "first")],
                members: vec![Member {
                    role: oid("user", "missing"),
                    admin: false,
                }],
            }),
            Statement::Role(Role {
                id: oid("role", "after"),
            }),
        ],
    });

    let err = policy.create(db).await.unwrap_err();
    // The innermost failing statement is reported, not the enclosing policy
    match &err {
        PolicyError::Statement { kind, .. } => assert_eq!(*kind, StatementKind::Grant),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(err.root(), PolicyError::ReferenceNotFound { id } if id == "acme:user:missing"));

    let roles = role_ids(db).await;
    assert!(roles.contains(&"acme:role:first".to_string()));
    assert!(!roles.contains(&"acme:role:after".to_string()));
}
