use axum::{
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};

use crate::error::ApiError;

/// `axum::Json` whose rejections use the API error body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                rejection.body_text(),
            ),
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                ApiError::bad_request(rejection.body_text())
            }
            _ => ApiError::new(rejection.status(), "invalid_body", rejection.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Score {
        value: u8,
    }

    async fn extract(content_type: &str, body: &str) -> Result<ApiJson<Score>, ApiError> {
        let req = Request::builder()
            .method("POST")
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        ApiJson::<Score>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn test_rejections_map_to_api_errors() {
        let ok = extract("application/json", r#"{"value": 7}"#).await;
        assert_eq!(ok.ok().map(|ApiJson(score)| score.value), Some(7));

        let overflow = extract("application/json", r#"{"value": 300}"#).await;
        assert_eq!(overflow.err().unwrap().status(), StatusCode::BAD_REQUEST);

        let missing = extract("application/json", "{}").await;
        assert_eq!(missing.err().unwrap().status(), StatusCode::BAD_REQUEST);

        let syntax = extract("application/json", "{").await;
        assert_eq!(syntax.err().unwrap().status(), StatusCode::BAD_REQUEST);

        let wrong_type = extract("text/plain", r#"{"value": 7}"#).await;
        assert_eq!(
            wrong_type.err().unwrap().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }
}
