use rest_scaffold::{Capabilities, DeletionPolicy, Resource};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Default, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "drives")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(default)]
    pub id: i32,
    pub name: String,
    pub capacity: i32,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tag_entity::Entity")]
    Tag,
}

impl Related<super::tag_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn model_with_id(id: i64) -> Model {
    Model {
        id: i32::try_from(id).unwrap_or_default(),
        ..Default::default()
    }
}

/// Drives expose their tags; locked drives refuse deletion.
impl Resource for Entity {
    type EntityType = Self;
    type Model = Model;
    type ActiveModelType = ActiveModel;

    const RESOURCE_NAME: &'static str = "drive";
    const ID_COLUMN: Column = Column::Id;

    fn id(model: &Model) -> i64 {
        i64::from(model.id)
    }

    fn new_with_id(id: i64) -> Model {
        model_with_id(id)
    }

    fn capabilities() -> Capabilities<Self> {
        Capabilities::new()
            .has_many::<super::tag_entity::Entity>("tags")
            .deletable_check(|drive: &Model| !drive.locked)
    }
}

/// Same table, with tags loaded on every read.
pub struct PreloadedDrives;

impl Resource for PreloadedDrives {
    type EntityType = Entity;
    type Model = Model;
    type ActiveModelType = ActiveModel;

    const RESOURCE_NAME: &'static str = "drive";
    const ID_COLUMN: Column = Column::Id;

    fn id(model: &Model) -> i64 {
        i64::from(model.id)
    }

    fn new_with_id(id: i64) -> Model {
        model_with_id(id)
    }

    fn capabilities() -> Capabilities<Self> {
        Capabilities::new()
            .has_many::<super::tag_entity::Entity>("tags")
            .preload("tags")
            .preload("snapshots")
    }
}

/// Same table, rows can never be deleted.
pub struct ArchivedDrives;

impl Resource for ArchivedDrives {
    type EntityType = Entity;
    type Model = Model;
    type ActiveModelType = ActiveModel;

    const RESOURCE_NAME: &'static str = "archived drive";
    const ID_COLUMN: Column = Column::Id;

    fn id(model: &Model) -> i64 {
        i64::from(model.id)
    }

    fn new_with_id(id: i64) -> Model {
        model_with_id(id)
    }

    fn capabilities() -> Capabilities<Self> {
        Capabilities::new().deletion(DeletionPolicy::Permanent)
    }
}
