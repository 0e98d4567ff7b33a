//! Drive inventory API with nested tags.
//!
//! ```bash
//! cargo run --example drive_api
//! # Bracket-style query strings instead of JSON parameters
//! REST_CONFIG='{"profile":"bracket"}' cargo run --example drive_api
//! ```
//!
//! Then try:
//! - `curl -i 'http://localhost:3000/drives?range=%5B0,1%5D'`
//! - `curl -i 'http://localhost:3000/drives/1/tags'`
//! - `curl -i 'http://localhost:3000/drives?embed=%5B%22tags%22%5D'`

use axum::Router;
use rest_scaffold::{
    Capabilities, DeletionPolicy, Resource, ResourceController, ResourceProvider, RestConfig,
    with_access_log,
};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::sync::Arc;

mod drive {
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
        #[sea_orm(has_many = "super::tag::Entity")]
        Tag,
    }

    impl Related<super::tag::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Tag.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

mod tag {
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
            belongs_to = "super::drive::Entity",
            from = "Column::DriveId",
            to = "super::drive::Column::Id",
            on_delete = "Cascade"
        )]
        Drive,
    }

    impl Related<super::drive::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Drive.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

impl Resource for drive::Entity {
    type EntityType = Self;
    type Model = drive::Model;
    type ActiveModelType = drive::ActiveModel;

    const RESOURCE_NAME: &'static str = "drive";
    const ID_COLUMN: drive::Column = drive::Column::Id;

    fn id(model: &drive::Model) -> i64 {
        i64::from(model.id)
    }

    fn new_with_id(id: i64) -> drive::Model {
        drive::Model {
            id: i32::try_from(id).unwrap_or_default(),
            ..Default::default()
        }
    }

    fn capabilities() -> Capabilities<Self> {
        Capabilities::new()
            .has_many::<tag::Entity>("tags")
            .deletable_check(|drive: &drive::Model| !drive.locked)
    }
}

impl Resource for tag::Entity {
    type EntityType = Self;
    type Model = tag::Model;
    type ActiveModelType = tag::ActiveModel;

    const RESOURCE_NAME: &'static str = "tag";
    const ID_COLUMN: tag::Column = tag::Column::Id;

    fn id(model: &tag::Model) -> i64 {
        i64::from(model.id)
    }

    fn new_with_id(id: i64) -> tag::Model {
        tag::Model {
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

async fn setup_database(url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut options = ConnectOptions::new(url.to_owned());
    // An in-memory database lives as long as its only connection
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;

    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    db.execute(backend.build(&schema.create_table_from_entity(drive::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(tag::Entity)))
        .await?;
    Ok(db)
}

async fn seed(
    drives: &ResourceProvider<drive::Entity>,
    tags: &ResourceProvider<tag::Entity>,
) -> Result<(), rest_scaffold::ProviderError> {
    let fleet = [
        ("Samsung 990 Pro", 2000, false),
        ("WD Red", 8000, true),
        ("Crucial MX500", 1000, false),
    ];
    let inserted = drives
        .insert_many(
            fleet
                .iter()
                .map(|(name, capacity, locked)| drive::Model {
                    id: 0,
                    name: (*name).to_string(),
                    capacity: *capacity,
                    locked: *locked,
                })
                .collect(),
        )
        .await?;

    for (drive_id, label) in [(1, "boot"), (1, "fast"), (2, "backup")] {
        tags.insert(tag::Model {
            id: 0,
            drive_id,
            label: label.to_string(),
            deleted_at: None,
        })
        .await?;
    }
    tracing::info!(drives = inserted, "Seeded sample data");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rest_scaffold=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let config = match env::var("REST_CONFIG") {
        Ok(raw) => RestConfig::from_json(&raw)?,
        Err(_) => RestConfig::default(),
    };
    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let db = Arc::new(setup_database(&database_url).await?);

    let drives = ResourceController::new(
        ResourceProvider::<drive::Entity>::new(Arc::clone(&db)),
        &config,
    );
    let tags = ResourceController::new(ResourceProvider::<tag::Entity>::new(db), &config);
    seed(drives.provider(), tags.provider()).await?;

    let app = Router::new()
        .nest(
            "/drives",
            drives.router().merge(drives.nested(tags.provider(), "tags")),
        )
        .nest("/tags", tags.router())
        .route("/health", axum::routing::get(|| async { "ok" }));
    let app = with_access_log(app, &config.log_skip_paths);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!(profile = ?config.profile, "Listening on http://0.0.0.0:3000");
    axum::serve(listener, app).await?;
    Ok(())
}
