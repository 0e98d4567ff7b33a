use rest_scaffold::{Capabilities, DeletionPolicy, Resource};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Default, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(default)]
    pub id: i32,
    pub drive_id: i32,
    pub label: String,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::drive_entity::Entity",
        from = "Column::DriveId",
        to = "super::drive_entity::Column::Id",
        on_delete = "Cascade"
    )]
    Drive,
}

impl Related<super::drive_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drive.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Tags are soft-deleted through `deleted_at`.
impl Resource for Entity {
    type EntityType = Self;
    type Model = Model;
    type ActiveModelType = ActiveModel;

    const RESOURCE_NAME: &'static str = "tag";
    const ID_COLUMN: Column = Column::Id;

    fn id(model: &Model) -> i64 {
        i64::from(model.id)
    }

    fn new_with_id(id: i64) -> Model {
        Model {
            id: i32::try_from(id).unwrap_or_default(),
            ..Default::default()
        }
    }

    fn capabilities() -> Capabilities<Self> {
        Capabilities::new().deletion(DeletionPolicy::Soft {
            column: "deleted_at",
        })
    }
}
