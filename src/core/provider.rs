use super::traits::{Association, Capabilities, DeletionPolicy, Record, Resource, related_select};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::errors::{ProviderError, QueryError};
use crate::filtering::{ColumnSchema, FilterSet, FindConditions, apply_filters};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    IdenStatic, IntoActiveModel, Iterable, ModelTrait, PaginatorTrait, QueryFilter, Related,
    Select,
    sea_query::{Alias, Expr, Keyword, SimpleExpr},
};
use std::str::FromStr;
use std::sync::Arc;

struct Registration<R: Resource> {
    capabilities: Capabilities<R>,
    schema: ColumnSchema,
}

/// Data access for one resource type over one connection pool.
///
/// Capabilities and the column schema are resolved once in [`ResourceProvider::new`];
/// clones share them.
pub struct ResourceProvider<R: Resource> {
    db: Arc<DatabaseConnection>,
    registration: Arc<Registration<R>>,
    batch_size: usize,
}

impl<R: Resource> Clone for ResourceProvider<R> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            registration: Arc::clone(&self.registration),
            batch_size: self.batch_size,
        }
    }
}

impl<R: Resource> ResourceProvider<R> {
    /// Accepts an owned connection or a shared `Arc` of one.
    #[must_use]
    pub fn new(db: impl Into<Arc<DatabaseConnection>>) -> Self {
        let mut capabilities = R::capabilities();
        capabilities.resolve();
        let schema =
            ColumnSchema::of::<R::EntityType>().with_fulltext(capabilities.fulltext.clone());

        tracing::debug!(
            resource = R::RESOURCE_NAME,
            table = schema.table(),
            preloads = ?capabilities.preloads(),
            deletion = ?capabilities.deletion_policy(),
            "Registered resource"
        );

        Self {
            db: db.into(),
            registration: Arc::new(Registration {
                capabilities,
                schema,
            }),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Rows per statement for [`ResourceProvider::insert_many`]. Zero keeps the default.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        self
    }

    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    #[must_use]
    pub fn schema(&self) -> &ColumnSchema {
        &self.registration.schema
    }

    #[must_use]
    pub fn capabilities(&self) -> &Capabilities<R> {
        &self.registration.capabilities
    }

    fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    fn not_found(id: i64) -> ProviderError {
        ProviderError::NotFound {
            resource: R::RESOURCE_NAME,
            id,
        }
    }

    fn not_deletable(id: i64) -> ProviderError {
        ProviderError::NotDeletable {
            resource: R::RESOURCE_NAME,
            id,
        }
    }

    fn exclude_deleted<S: QueryFilter>(&self, query: S) -> S {
        self.capabilities()
            .deletion_policy()
            .exclude_deleted(query, self.schema().table())
    }

    fn select(&self) -> Select<R::EntityType> {
        self.exclude_deleted(R::EntityType::find())
    }

    /// Declared preloads followed by `embeds`, without duplicates.
    fn relations(&self, embeds: &[String]) -> Result<Vec<&Association<R>>, ProviderError> {
        let capabilities = self.capabilities();
        let mut relations: Vec<&Association<R>> = Vec::new();
        let names = capabilities
            .preloads()
            .iter()
            .copied()
            .chain(embeds.iter().map(String::as_str));
        for name in names {
            if relations.iter().any(|association| association.name() == name) {
                continue;
            }
            let association =
                capabilities
                    .association(name)
                    .ok_or_else(|| ProviderError::UnknownRelation {
                        resource: R::RESOURCE_NAME,
                        relation: name.to_string(),
                    })?;
            relations.push(association);
        }
        Ok(relations)
    }

    async fn embed(
        &self,
        models: Vec<R::Model>,
        relations: &[&Association<R>],
    ) -> Result<Vec<Record<R::Model>>, ProviderError> {
        let mut records: Vec<Record<R::Model>> = Vec::with_capacity(models.len());
        for model in models {
            let mut record = Record::new(model);
            for association in relations {
                let children = association.load(self.db(), &record.model).await?;
                record
                    .embedded
                    .insert(association.name().to_string(), children);
            }
            records.push(record);
        }
        Ok(records)
    }

    async fn fetch(&self, id: i64) -> Result<R::Model, ProviderError> {
        self.select()
            .filter(R::ID_COLUMN.eq(id))
            .one(self.db())
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Fetch by id with the declared preloads.
    ///
    /// # Errors
    /// [`ProviderError::NotFound`] when no row matches; store failures pass through.
    pub async fn find_one(&self, id: i64) -> Result<Record<R::Model>, ProviderError> {
        let relations = self.relations(&[])?;
        let model = self.fetch(id).await?;
        let mut records = self.embed(vec![model], &relations).await?;
        records.pop().ok_or_else(|| Self::not_found(id))
    }

    /// Filters, then orders, then pagination, then eager loading.
    ///
    /// # Errors
    /// [`ProviderError::UnknownRelation`] for an undeclared embed, before any query runs.
    pub async fn find(
        &self,
        conditions: &FindConditions,
    ) -> Result<Vec<Record<R::Model>>, ProviderError> {
        let relations = self.relations(&conditions.embeds)?;
        let query = conditions.apply(self.select(), self.schema(), self.backend())?;
        let models = query.all(self.db()).await?;
        tracing::debug!(resource = R::RESOURCE_NAME, rows = models.len(), "find");
        self.embed(models, &relations).await
    }

    /// Like [`ResourceProvider::find`], scoped to the children of `parent`.
    ///
    /// `parent` only needs its id set; see [`Resource::new_with_id`].
    ///
    /// # Errors
    /// Same as [`ResourceProvider::find`].
    pub async fn find_assoc<P>(
        &self,
        parent: &P::Model,
        relation: &str,
        conditions: &FindConditions,
    ) -> Result<Vec<Record<R::Model>>, ProviderError>
    where
        P: Resource,
        P::EntityType: Related<R::EntityType>,
    {
        let relations = self.relations(&conditions.embeds)?;
        let query = conditions.apply(
            related_select::<P, R>(parent),
            self.schema(),
            self.backend(),
        )?;
        let models = query.all(self.db()).await?;
        tracing::debug!(
            resource = R::RESOURCE_NAME,
            parent = P::RESOURCE_NAME,
            parent_id = P::id(parent),
            relation,
            rows = models.len(),
            "find_assoc"
        );
        self.embed(models, &relations).await
    }

    /// # Errors
    /// Operand coercion and store failures.
    pub async fn count(&self, filters: &FilterSet) -> Result<u64, ProviderError> {
        let query = apply_filters(self.select(), filters, self.schema(), self.backend())?;
        Ok(query.count(self.db()).await?)
    }

    /// # Errors
    /// Operand coercion and store failures.
    pub async fn count_assoc<P>(
        &self,
        parent: &P::Model,
        relation: &str,
        filters: &FilterSet,
    ) -> Result<u64, ProviderError>
    where
        P: Resource,
        P::EntityType: Related<R::EntityType>,
    {
        let query = apply_filters(
            related_select::<P, R>(parent),
            filters,
            self.schema(),
            self.backend(),
        )?;
        let total = query.count(self.db()).await?;
        tracing::debug!(
            resource = R::RESOURCE_NAME,
            parent = P::RESOURCE_NAME,
            relation,
            total,
            "count_assoc"
        );
        Ok(total)
    }

    // ============================================================================
    // Writes
    // ============================================================================

    fn new_active_model(model: R::Model) -> R::ActiveModelType {
        let mut active: R::ActiveModelType = model.into_active_model();
        active.not_set(R::ID_COLUMN);
        active
    }

    /// Insert one row; the store assigns the id.
    ///
    /// # Errors
    /// Store failures, including constraint violations.
    pub async fn insert(&self, model: R::Model) -> Result<R::Model, ProviderError> {
        let inserted = Self::new_active_model(model).insert(self.db()).await?;
        tracing::debug!(resource = R::RESOURCE_NAME, id = R::id(&inserted), "insert");
        Ok(inserted)
    }

    /// Insert in statements of the configured batch size. Returns rows inserted.
    ///
    /// # Errors
    /// Store failures; earlier batches stay inserted.
    pub async fn insert_many(&self, models: Vec<R::Model>) -> Result<u64, ProviderError> {
        self.insert_batch(models, self.batch_size).await
    }

    /// Insert in statements of `size` rows; `0` means the default of 100.
    ///
    /// # Errors
    /// Store failures; earlier batches stay inserted.
    pub async fn insert_batch(
        &self,
        models: Vec<R::Model>,
        size: usize,
    ) -> Result<u64, ProviderError> {
        let size = if size == 0 { DEFAULT_BATCH_SIZE } else { size };
        let mut inserted = 0;
        let mut models = models.into_iter().peekable();
        while models.peek().is_some() {
            let batch: Vec<R::ActiveModelType> = models
                .by_ref()
                .take(size)
                .map(Self::new_active_model)
                .collect();
            inserted += R::EntityType::insert_many(batch)
                .exec_without_returning(self.db())
                .await?;
        }
        tracing::debug!(
            resource = R::RESOURCE_NAME,
            rows = inserted,
            batch_size = size,
            "insert_batch"
        );
        Ok(inserted)
    }

    /// Full-row update of every column but the id and the soft-delete stamp.
    /// Returns rows affected (0 or 1).
    ///
    /// # Errors
    /// Store failures.
    pub async fn update(&self, id: i64, model: &R::Model) -> Result<u64, ProviderError> {
        let id_column = R::ID_COLUMN;
        let deleted_column = match self.capabilities().deletion_policy() {
            DeletionPolicy::Soft { column } => Some(column),
            DeletionPolicy::Hard | DeletionPolicy::Permanent => None,
        };
        let mut update = R::EntityType::update_many();
        for column in <R::EntityType as EntityTrait>::Column::iter() {
            let name = column.as_str();
            if name == id_column.as_str() || deleted_column == Some(name) {
                continue;
            }
            update = update.col_expr(column, SimpleExpr::Value(model.get(column)));
        }
        let result = self
            .exclude_deleted(update.filter(R::ID_COLUMN.eq(id)))
            .exec(self.db())
            .await?;
        tracing::debug!(resource = R::RESOURCE_NAME, id, rows = result.rows_affected, "update");
        Ok(result.rows_affected)
    }

    /// Partial update from a field map; `null` clears a column. Returns the updated row.
    ///
    /// # Errors
    /// [`QueryError::InvalidField`] for unknown fields or the id,
    /// [`QueryError::InvalidOperand`] for values that don't fit the column,
    /// [`ProviderError::NotFound`] when the row is missing.
    pub async fn update_fields(
        &self,
        id: i64,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Record<R::Model>, ProviderError> {
        if !fields.is_empty() {
            let mut update = R::EntityType::update_many();
            for (field, value) in fields {
                let column = <R::EntityType as EntityTrait>::Column::from_str(field)
                    .map_err(|_| QueryError::InvalidField(field.clone()))?;
                if column.as_str() == R::ID_COLUMN.as_str() {
                    return Err(QueryError::InvalidField(field.clone()).into());
                }
                let expr = match self.schema().coerce_json(field, value)? {
                    Some(value) => SimpleExpr::Value(value),
                    None => SimpleExpr::Keyword(Keyword::Null),
                };
                update = update.col_expr(column, expr);
            }
            let result = self
                .exclude_deleted(update.filter(R::ID_COLUMN.eq(id)))
                .exec(self.db())
                .await?;
            if result.rows_affected == 0 {
                return Err(Self::not_found(id));
            }
        }
        self.find_one(id).await
    }

    /// Delete by id under the declared policy.
    ///
    /// # Errors
    /// [`ProviderError::NotFound`] when missing, [`ProviderError::NotDeletable`] when vetoed.
    /// A vetoed row issues no delete statement.
    pub async fn delete(&self, id: i64) -> Result<u64, ProviderError> {
        let model = self.fetch(id).await?;
        if !self.capabilities().is_deletable(&model) {
            return Err(Self::not_deletable(id));
        }
        let rows = self.remove(R::ID_COLUMN.eq(id)).await?;
        tracing::debug!(resource = R::RESOURCE_NAME, id, rows, "delete");
        Ok(rows)
    }

    /// Delete every id in `ids`; affects at most `ids.len()` rows.
    ///
    /// # Errors
    /// [`ProviderError::NotDeletable`] if any row is vetoed; nothing is deleted then.
    pub async fn delete_many(&self, ids: &[i64]) -> Result<u64, ProviderError> {
        let Some(&first) = ids.first() else {
            return Ok(0);
        };
        if self.capabilities().deletion_policy() == DeletionPolicy::Permanent {
            return Err(Self::not_deletable(first));
        }
        let models = self
            .select()
            .filter(R::ID_COLUMN.is_in(ids.iter().copied()))
            .all(self.db())
            .await?;
        if let Some(vetoed) = models
            .iter()
            .find(|model| !self.capabilities().is_deletable(model))
        {
            return Err(Self::not_deletable(R::id(vetoed)));
        }
        let rows = self.remove(R::ID_COLUMN.is_in(ids.iter().copied())).await?;
        tracing::debug!(resource = R::RESOURCE_NAME, requested = ids.len(), rows, "delete_many");
        Ok(rows)
    }

    async fn remove(&self, condition: SimpleExpr) -> Result<u64, ProviderError> {
        let result = match self.capabilities().deletion_policy() {
            DeletionPolicy::Soft { column } => {
                self.exclude_deleted(
                    R::EntityType::update_many()
                        .col_expr(Alias::new(column), Expr::current_timestamp().into())
                        .filter(condition),
                )
                .exec(self.db())
                .await?
                .rows_affected
            }
            DeletionPolicy::Hard => {
                R::EntityType::delete_many()
                    .filter(condition)
                    .exec(self.db())
                    .await?
                    .rows_affected
            }
            DeletionPolicy::Permanent => return Err(Self::not_deletable(0)),
        };
        Ok(result)
    }
}
