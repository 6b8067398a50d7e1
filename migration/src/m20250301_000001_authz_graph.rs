use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable foreign keys for SQLite
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            manager
                .get_connection()
                .execute_unprepared("PRAGMA foreign_keys = ON")
                .await?;
        }

        // Create roles table
        manager
            .create_table(
                Table::create()
                    .table(Roles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Roles::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(big_integer_null(Roles::Uidnumber))
                    .col(big_integer_null(Roles::Gidnumber))
                    .col(big_integer(Roles::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Create resources table
        manager
            .create_table(
                Table::create()
                    .table(Resources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Resources::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(Resources::OwnerId))
                    .col(big_integer(Resources::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_resources_owner")
                            .from(Resources::Table, Resources::OwnerId)
                            .to(Roles::Table, Roles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_resources_owner")
                    .table(Resources::Table)
                    .col(Resources::OwnerId)
                    .to_owned(),
            )
            .await?;

        // Create annotations table (duplicate names are allowed, hence the surrogate key)
        manager
            .create_table(
                Table::create()
                    .table(Annotations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Annotations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(Annotations::ResourceId))
                    .col(string(Annotations::Name))
                    .col(string(Annotations::Value))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_annotations_resource")
                            .from(Annotations::Table, Annotations::ResourceId)
                            .to(Resources::Table, Resources::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_annotations_resource")
                    .table(Annotations::Table)
                    .col(Annotations::ResourceId)
                    .to_owned(),
            )
            .await?;

        // Create role_memberships table
        manager
            .create_table(
                Table::create()
                    .table(RoleMemberships::Table)
                    .if_not_exists()
                    .col(string(RoleMemberships::RoleId))
                    .col(string(RoleMemberships::MemberId))
                    .col(
                        ColumnDef::new(RoleMemberships::AdminOption)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .primary_key(
                        Index::create()
                            .col(RoleMemberships::RoleId)
                            .col(RoleMemberships::MemberId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_memberships_role")
                            .from(RoleMemberships::Table, RoleMemberships::RoleId)
                            .to(Roles::Table, Roles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_memberships_member")
                            .from(RoleMemberships::Table, RoleMemberships::MemberId)
                            .to(Roles::Table, Roles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_role_memberships_member")
                    .table(RoleMemberships::Table)
                    .col(RoleMemberships::MemberId)
                    .to_owned(),
            )
            .await?;

        // Create permissions table
        manager
            .create_table(
                Table::create()
                    .table(Permissions::Table)
                    .if_not_exists()
                    .col(string(Permissions::ResourceId))
                    .col(string(Permissions::Privilege))
                    .col(string(Permissions::RoleId))
                    .primary_key(
                        Index::create()
                            .col(Permissions::ResourceId)
                            .col(Permissions::Privilege)
                            .col(Permissions::RoleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_permissions_resource")
                            .from(Permissions::Table, Permissions::ResourceId)
                            .to(Resources::Table, Resources::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_permissions_role")
                            .from(Permissions::Table, Permissions::RoleId)
                            .to(Roles::Table, Roles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_permissions_role")
                    .table(Permissions::Table)
                    .col(Permissions::RoleId)
                    .to_owned(),
            )
            .await?;

        // Create secrets table
        manager
            .create_table(
                Table::create()
                    .table(Secrets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Secrets::ResourceId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(text(Secrets::Value))
                    .col(big_integer(Secrets::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_secrets_resource")
                            .from(Secrets::Table, Secrets::ResourceId)
                            .to(Resources::Table, Resources::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Secrets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Permissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoleMemberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Annotations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Resources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Roles::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Roles {
    Table,
    Id,
    Uidnumber,
    Gidnumber,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Resources {
    Table,
    Id,
    OwnerId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Annotations {
    Table,
    Id,
    ResourceId,
    Name,
    Value,
}

#[derive(DeriveIden)]
enum RoleMemberships {
    Table,
    RoleId,
    MemberId,
    AdminOption,
}

#[derive(DeriveIden)]
enum Permissions {
    Table,
    ResourceId,
    Privilege,
    RoleId,
}

#[derive(DeriveIden)]
enum Secrets {
    Table,
    ResourceId,
    Value,
    CreatedAt,
}
