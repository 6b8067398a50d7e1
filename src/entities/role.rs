use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    /// Fully qualified id, `account:kind:identifier`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub uidnumber: Option<i64>,
    pub gidnumber: Option<i64>,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
