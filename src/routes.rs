use crate::config::RestConfig;
use crate::core::{Record, Resource, ResourceProvider};
use crate::errors::ApiError;
use crate::filtering::{QueryParams, QueryParser, content_range_headers};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    routing::get,
};
use hyper::HeaderMap;
use sea_orm::Related;
use std::marker::PhantomData;
use std::sync::Arc;

/// HTTP surface of one resource.
///
/// ```rust,ignore
/// let drives = ResourceController::new(ResourceProvider::<drive::Entity>::new(Arc::clone(&db)), &config);
/// let tags = ResourceProvider::<tag::Entity>::new(db);
/// let app = Router::new().nest(
///     "/drives",
///     drives.router().merge(drives.nested(&tags, "tags")),
/// );
/// ```
pub struct ResourceController<R: Resource> {
    provider: ResourceProvider<R>,
    parser: Arc<QueryParser>,
}

impl<R: Resource> Clone for ResourceController<R> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            parser: Arc::clone(&self.parser),
        }
    }
}

impl<R: Resource> ResourceController<R> {
    #[must_use]
    pub fn new(provider: ResourceProvider<R>, config: &RestConfig) -> Self {
        Self {
            provider: provider.with_batch_size(config.batch_size),
            parser: Arc::new(QueryParser::new(config.profile)),
        }
    }

    #[must_use]
    pub fn provider(&self) -> &ResourceProvider<R> {
        &self.provider
    }

    /// `GET /`, `POST /`, `GET /{id}`, `PUT /{id}`, `DELETE /{id}`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(list::<R>).post(create::<R>))
            .route(
                "/{id}",
                get(get_one::<R>).put(update::<R>).delete(delete_one::<R>),
            )
            .with_state(self.clone())
    }

    /// `GET /{id}/{relation}` listing the children of one parent.
    pub fn nested<C>(&self, child: &ResourceProvider<C>, relation: &str) -> Router
    where
        C: Resource,
        R::EntityType: Related<C::EntityType>,
    {
        if self.provider.capabilities().association(relation).is_none() {
            tracing::warn!(
                resource = R::RESOURCE_NAME,
                relation,
                "Nested route for a relation the resource does not declare"
            );
        }
        let state = NestedState::<R, C> {
            child: child.clone(),
            parser: Arc::clone(&self.parser),
            relation: Arc::from(relation),
            parent: PhantomData,
        };
        Router::new()
            .route(&format!("/{{id}}/{relation}"), get(list_nested::<R, C>))
            .with_state(state)
    }
}

struct NestedState<P, C: Resource> {
    child: ResourceProvider<C>,
    parser: Arc<QueryParser>,
    relation: Arc<str>,
    parent: PhantomData<fn() -> P>,
}

impl<P, C: Resource> Clone for NestedState<P, C> {
    fn clone(&self) -> Self {
        Self {
            child: self.child.clone(),
            parser: Arc::clone(&self.parser),
            relation: Arc::clone(&self.relation),
            parent: PhantomData,
        }
    }
}

type ListResponse<M> = (StatusCode, HeaderMap, Json<Vec<Record<M>>>);

async fn list<R: Resource>(
    State(controller): State<ResourceController<R>>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<ListResponse<R::Model>, ApiError> {
    let Query(pairs) = pairs?;
    let conditions = controller.parser.parse(&QueryParams::new(pairs))?;
    let records = controller.provider.find(&conditions).await?;
    let total = controller.provider.count(&conditions.filters).await?;
    let (status, headers) = content_range_headers(&conditions.pagination, total);
    Ok((status, headers, Json(records)))
}

async fn get_one<R: Resource>(
    State(controller): State<ResourceController<R>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Record<R::Model>>, ApiError> {
    let Path(id) = id?;
    Ok(Json(controller.provider.find_one(id).await?))
}

async fn create<R: Resource>(
    State(controller): State<ResourceController<R>>,
    payload: Result<Json<R::Model>, JsonRejection>,
) -> Result<(StatusCode, Json<Record<R::Model>>), ApiError> {
    let Json(model) = payload?;
    let created = controller.provider.insert(model).await?;
    let record = controller.provider.find_one(R::id(&created)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update<R: Resource>(
    State(controller): State<ResourceController<R>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<R::Model>, JsonRejection>,
) -> Result<(StatusCode, Json<Record<R::Model>>), ApiError> {
    let Path(id) = id?;
    let Json(model) = payload?;
    // Zero rows affected is ambiguous; the fetch below settles whether the row exists
    controller.provider.update(id, &model).await?;
    let record = controller.provider.find_one(id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn delete_one<R: Resource>(
    State(controller): State<ResourceController<R>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    controller.provider.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_nested<P, C>(
    State(state): State<NestedState<P, C>>,
    id: Result<Path<i64>, PathRejection>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<ListResponse<C::Model>, ApiError>
where
    P: Resource,
    C: Resource,
    P::EntityType: Related<C::EntityType>,
{
    let Path(id) = id?;
    let Query(pairs) = pairs?;
    let parent = P::new_with_id(id);
    let conditions = state.parser.parse(&QueryParams::new(pairs))?;
    let records = state
        .child
        .find_assoc::<P>(&parent, &state.relation, &conditions)
        .await?;
    let total = state
        .child
        .count_assoc::<P>(&parent, &state.relation, &conditions.filters)
        .await?;
    let (status, headers) = content_range_headers(&conditions.pagination, total);
    Ok((status, headers, Json(records)))
}
