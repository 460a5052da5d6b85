//! Request extractors with JSON error bodies.
//!
//! axum's stock extractors reject with plain-text bodies. These wrappers
//! convert every rejection into an [`ApiError`].

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query},
    http::request::Parts,
};
use serde::{de::DeserializeOwned, Deserialize};
use sirius_core::DishCategory;

use crate::error::{ApiError, ApiResult};

/// JSON body extractor whose rejection is an [`ApiError`].
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Typed `:id` path segment.
///
/// A non-integer id is a 422 naming the field instead of axum's plain 400.
#[derive(Debug, Clone, Copy)]
pub struct PathId<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for PathId<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(PathId(id))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCategoryQuery {
    category: Option<String>,
}

/// Optional `?category=` filter.
///
/// Accepts the display value, the database label or the slug. Any other
/// value is a validation error rather than an empty result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryFilter(pub Option<DishCategory>);

impl CategoryFilter {
    fn parse(raw: Option<String>) -> ApiResult<Self> {
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(CategoryFilter(None)),
            Some(value) => value
                .parse::<DishCategory>()
                .map(|c| CategoryFilter(Some(c)))
                .map_err(|e| {
                    ApiError::validation_failed(e.to_string())
                        .with_details(serde_json::json!({ "field": "category" }))
                }),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CategoryFilter
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawCategoryQuery>::from_request_parts(parts, state).await?;
        CategoryFilter::parse(raw.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract_category(uri: &str) -> ApiResult<CategoryFilter> {
        let (mut parts, _) = Request::builder()
            .uri(uri)
            .body(())
            .map_err(|e| ApiError::internal_error(e.to_string()))?
            .into_parts();
        CategoryFilter::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_category_filter_absent() -> ApiResult<()> {
        assert_eq!(extract_category("/dishes").await?, CategoryFilter(None));
        assert_eq!(extract_category("/dishes?category=").await?, CategoryFilter(None));
        Ok(())
    }

    #[tokio::test]
    async fn test_category_filter_accepts_slug_and_label() -> ApiResult<()> {
        assert_eq!(
            extract_category("/dishes?category=soup").await?,
            CategoryFilter(Some(DishCategory::Soup))
        );
        assert_eq!(
            extract_category("/dishes?category=HOT_DRINK").await?,
            CategoryFilter(Some(DishCategory::HotDrink))
        );
        // "Суп", percent-encoded
        assert_eq!(
            extract_category("/dishes?category=%D0%A1%D1%83%D0%BF").await?,
            CategoryFilter(Some(DishCategory::Soup))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_category_filter_rejects_unknown() {
        let err = extract_category("/dishes?category=pizza").await.err();
        let err = err.map(|e| e.status_code());
        assert_eq!(err, Some(StatusCode::UNPROCESSABLE_ENTITY));
    }
}
