use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DbErr, EntityName, EntityTrait,
    FromQueryResult, IntoActiveModel, ModelTrait, QueryFilter, Related, Select,
    sea_query::{Alias, Expr},
};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

/// Describes one model exposed as a REST resource.
///
/// Implement it on the sea-orm `Entity`. Optional behaviour is declared once in
/// [`Resource::capabilities`] and captured when the provider is built.
///
/// ```rust,ignore
/// impl Resource for drive::Entity {
///     type EntityType = Self;
///     type Model = drive::Model;
///     type ActiveModelType = drive::ActiveModel;
///
///     const RESOURCE_NAME: &'static str = "drive";
///     const ID_COLUMN: drive::Column = drive::Column::Id;
///
///     fn id(model: &drive::Model) -> i64 { model.id.into() }
///     fn new_with_id(id: i64) -> drive::Model { drive::Model { id: id as i32, ..Default::default() } }
///
///     fn capabilities() -> Capabilities<Self> {
///         Capabilities::new()
///             .has_many::<tag::Entity>("tags")
///             .preload("tags")
///             .deletable_check(|drive| !drive.locked)
///     }
/// }
/// ```
pub trait Resource: Sized + Send + Sync + 'static {
    type EntityType: EntityTrait<Model = Self::Model> + Sync;
    type Model: ModelTrait<Entity = Self::EntityType>
        + FromQueryResult
        + IntoActiveModel<Self::ActiveModelType>
        + Serialize
        + DeserializeOwned
        + Clone
        + Send
        + Sync
        + 'static;
    type ActiveModelType: ActiveModelTrait<Entity = Self::EntityType>
        + ActiveModelBehavior
        + Send
        + Sync
        + 'static;

    /// Singular name used in error messages and logs.
    const RESOURCE_NAME: &'static str;
    const ID_COLUMN: <Self::EntityType as EntityTrait>::Column;

    fn id(model: &Self::Model) -> i64;

    /// A model carrying only `id`, used to address nested queries without a fetch.
    fn new_with_id(id: i64) -> Self::Model;

    fn capabilities() -> Capabilities<Self> {
        Capabilities::new()
    }
}

/// How `delete` removes a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletionPolicy {
    #[default]
    Hard,
    /// Stamp `column` with the current time; reads skip stamped rows.
    Soft { column: &'static str },
    /// Rows are never deleted.
    Permanent,
}

impl DeletionPolicy {
    /// Hide soft-deleted rows of `table`.
    pub fn exclude_deleted<S: QueryFilter>(self, query: S, table: &str) -> S {
        match self {
            Self::Soft { column } => {
                query.filter(Expr::col((Alias::new(table), Alias::new(column))).is_null())
            }
            Self::Hard | Self::Permanent => query,
        }
    }
}

pub type LoadFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<serde_json::Value>, DbErr>> + Send + 'a>>;

type LoadFn<R> =
    for<'a> fn(&'a DatabaseConnection, &'a <R as Resource>::Model) -> LoadFuture<'a>;

/// A named one-to-many relation usable for `embed` and preloading.
pub struct Association<R: Resource> {
    name: &'static str,
    load: LoadFn<R>,
}

impl<R: Resource> Association<R> {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Children of `parent`, serialized.
    pub fn load<'a>(&self, db: &'a DatabaseConnection, parent: &'a R::Model) -> LoadFuture<'a> {
        (self.load)(db, parent)
    }
}

impl<R: Resource> std::fmt::Debug for Association<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association").field("name", &self.name).finish()
    }
}

/// Children of `parent` through `Related`, honouring the child's deletion policy.
#[must_use]
pub fn related_select<P, C>(parent: &P::Model) -> Select<C::EntityType>
where
    P: Resource,
    C: Resource,
    P::EntityType: Related<C::EntityType>,
{
    let select = parent.find_related(C::EntityType::default());
    let table = C::EntityType::default().table_name().to_string();
    C::capabilities().deletion.exclude_deleted(select, &table)
}

fn load_children<'a, P, C>(db: &'a DatabaseConnection, parent: &'a P::Model) -> LoadFuture<'a>
where
    P: Resource,
    C: Resource,
    P::EntityType: Related<C::EntityType>,
{
    Box::pin(async move {
        let children = related_select::<P, C>(parent).all(db).await?;
        children
            .iter()
            .map(|child| serde_json::to_value(child).map_err(|err| DbErr::Json(err.to_string())))
            .collect()
    })
}

/// Optional behaviour of a resource. Every field has a visible default.
pub struct Capabilities<R: Resource> {
    pub(crate) preloads: Vec<&'static str>,
    pub(crate) fulltext: BTreeMap<String, String>,
    pub(crate) deletable: Option<fn(&R::Model) -> bool>,
    pub(crate) deletion: DeletionPolicy,
    pub(crate) associations: Vec<Association<R>>,
}

impl<R: Resource> Default for Capabilities<R> {
    fn default() -> Self {
        Self {
            preloads: Vec::new(),
            fulltext: BTreeMap::new(),
            deletable: None,
            deletion: DeletionPolicy::Hard,
            associations: Vec::new(),
        }
    }
}

impl<R: Resource> Capabilities<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Eager-load `relation` on every read.
    #[must_use]
    pub fn preload(mut self, relation: &'static str) -> Self {
        if !self.preloads.contains(&relation) {
            self.preloads.push(relation);
        }
        self
    }

    /// Full-text queries on `field` run against `index_column` instead.
    #[must_use]
    pub fn fulltext_index(mut self, field: &str, index_column: &str) -> Self {
        self.fulltext
            .insert(field.to_string(), index_column.to_string());
        self
    }

    /// Veto deletion when `check` returns false.
    #[must_use]
    pub fn deletable_check(mut self, check: fn(&R::Model) -> bool) -> Self {
        self.deletable = Some(check);
        self
    }

    #[must_use]
    pub fn deletion(mut self, policy: DeletionPolicy) -> Self {
        self.deletion = policy;
        self
    }

    /// Declare a one-to-many relation to `C` named `name`.
    #[must_use]
    pub fn has_many<C>(mut self, name: &'static str) -> Self
    where
        C: Resource,
        R::EntityType: Related<C::EntityType>,
    {
        self.associations.retain(|association| association.name != name);
        self.associations.push(Association {
            name,
            load: load_children::<R, C>,
        });
        self
    }

    #[must_use]
    pub fn association(&self, name: &str) -> Option<&Association<R>> {
        self.associations
            .iter()
            .find(|association| association.name == name)
    }

    #[must_use]
    pub fn preloads(&self) -> &[&'static str] {
        &self.preloads
    }

    #[must_use]
    pub const fn deletion_policy(&self) -> DeletionPolicy {
        self.deletion
    }

    /// Whether `model` may be deleted under the declared policy and check.
    #[must_use]
    pub fn is_deletable(&self, model: &R::Model) -> bool {
        if self.deletion == DeletionPolicy::Permanent {
            return false;
        }
        self.deletable.is_none_or(|check| check(model))
    }

    /// Drop preloads that name no declared association.
    pub(crate) fn resolve(&mut self) {
        let known: Vec<&'static str> = self.associations.iter().map(|a| a.name).collect();
        self.preloads.retain(|relation| {
            let found = known.contains(relation);
            if !found {
                tracing::warn!(
                    resource = R::RESOURCE_NAME,
                    relation,
                    "Ignoring preload of undeclared relation"
                );
            }
            found
        });
    }
}

/// A fetched model with its embedded relations, serialized side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record<M> {
    #[serde(flatten)]
    pub model: M,
    #[serde(flatten)]
    pub embedded: BTreeMap<String, Vec<serde_json::Value>>,
}

impl<M> Record<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            embedded: BTreeMap::new(),
        }
    }
}
