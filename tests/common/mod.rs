#![allow(dead_code)]

use axum::Router;
use rest_scaffold::{ResourceController, ResourceProvider, RestConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, Schema};
use sea_orm_migration::prelude::*;
use std::sync::Arc;

pub mod drive_entity;
pub mod tag_entity;

pub async fn setup_test_db() -> Result<Arc<DatabaseConnection>, DbErr> {
    // One connection keeps the in-memory database alive across queries
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;

    Ok(Arc::new(db))
}

pub fn setup_test_app_with(db: Arc<DatabaseConnection>, config: &RestConfig) -> Router {
    let drives = ResourceController::new(
        ResourceProvider::<drive_entity::Entity>::new(Arc::clone(&db)),
        config,
    );
    let tags = ResourceController::new(
        ResourceProvider::<tag_entity::Entity>::new(Arc::clone(&db)),
        config,
    );
    let archived = ResourceController::new(
        ResourceProvider::<drive_entity::ArchivedDrives>::new(Arc::clone(&db)),
        config,
    );
    let preloaded = ResourceController::new(
        ResourceProvider::<drive_entity::PreloadedDrives>::new(db),
        config,
    );

    let api = Router::new()
        .nest(
            "/drives",
            drives.router().merge(drives.nested(tags.provider(), "tags")),
        )
        .nest("/tags", tags.router())
        .nest("/archived", archived.router())
        .nest("/preloaded", preloaded.router());

    Router::new().nest("/api", api)
}

pub fn setup_test_app(db: Arc<DatabaseConnection>) -> Router {
    setup_test_app_with(db, &RestConfig::default())
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateDriveTables)]
    }
}

pub struct CreateDriveTables;

#[async_trait::async_trait]
impl MigrationName for CreateDriveTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_drive_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateDriveTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());
        manager
            .create_table(schema.create_table_from_entity(drive_entity::Entity))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(tag_entity::Entity))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(tag_entity::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(drive_entity::Entity).to_owned())
            .await?;
        Ok(())
    }
}
