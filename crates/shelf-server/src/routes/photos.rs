//! Photo catalog route handlers.

use std::path::Path as FsPath;

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use shelf_core::{Error, ListQuery, PageRequest, Result, SortField, SortOrder};
use shelf_db::models::Photo;

use crate::catalog::{Payload, UploadForm};
use crate::context::AppContext;
use crate::error::AppError;

/// Query parameters for listing photos. Everything is optional and parsed
/// leniently; see [`ListQuery`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPhotosParams {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl ListPhotosParams {
    pub fn into_query(self) -> ListQuery {
        ListQuery {
            search: ListQuery::normalize_search(self.search.as_deref()),
            sort: SortField::from_param(self.sort.as_deref()),
            order: SortOrder::from_param(self.order.as_deref()),
            page: PageRequest::from_params(self.page.as_deref(), self.page_size.as_deref()),
        }
    }
}

/// Photo response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
    pub id: i64,
    pub name: String,
    pub tags: Vec<String>,
    pub upload_timestamp: DateTime<Utc>,
    pub image_locator: String,
}

impl PhotoResponse {
    fn from_model(photo: &Photo) -> Self {
        Self {
            id: photo.id.get(),
            name: photo.name.clone(),
            tags: photo.tags.clone(),
            upload_timestamp: photo.uploaded_at,
            image_locator: photo.locator.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoListResponse {
    pub items: Vec<PhotoResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// `GET /api/photos`
pub async fn list_photos(
    State(ctx): State<AppContext>,
    Query(params): Query<ListPhotosParams>,
) -> std::result::Result<Json<PhotoListResponse>, AppError> {
    let query = params.into_query();
    let page = ctx.photos.list(&query).await?;

    Ok(Json(PhotoListResponse {
        items: page.items.iter().map(PhotoResponse::from_model).collect(),
        total: page.total,
        page: query.page.number,
        page_size: query.page.size,
    }))
}

/// `POST /api/photos` with multipart fields `name`, `tags` and file `photo`.
pub async fn create_photo(
    State(ctx): State<AppContext>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<(StatusCode, Json<PhotoResponse>), AppError> {
    let mut multipart = multipart.map_err(|e| {
        Error::Validation(format!("Expected a multipart/form-data body: {}", e.body_text()))
    })?;

    let mut form = UploadForm::default();
    let mut payload = None;
    if let Err(e) = read_form(&ctx, &mut multipart, &mut form, &mut payload).await {
        if let Some(Payload::Staged(locator)) = &payload {
            ctx.uploads.discard(locator).await;
        }
        return Err(e.into());
    }

    let photo = ctx.uploads.upload(form, payload).await?;
    Ok((StatusCode::CREATED, Json(PhotoResponse::from_model(&photo))))
}

/// Drain the multipart body, streaming the `photo` field into the blob store.
///
/// When `name` arrives before `photo` and is already invalid, the payload
/// is rejected without being stored.
async fn read_form(
    ctx: &AppContext,
    multipart: &mut Multipart,
    form: &mut UploadForm,
    payload: &mut Option<Payload>,
) -> Result<()> {
    let limit = ctx.config.storage.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("name") => form.name = Some(read_text(field, limit).await?),
            Some("tags") => form.tags = Some(read_text(field, limit).await?),
            Some("photo") => {
                if payload.is_some() {
                    return Err(Error::Validation("Only one photo may be uploaded".into()));
                }
                if form.name.is_some() {
                    shelf_core::NewPhoto::from_form(form.name.as_deref(), form.tags.as_deref())?;
                }
                let extension = field
                    .file_name()
                    .and_then(|f| FsPath::new(f).extension())
                    .and_then(|e| e.to_str())
                    .map(str::to_owned);
                let chunks = field.map_err(move |e| multipart_error(e, limit));
                let locator = ctx.uploads.stage(extension.as_deref(), chunks).await?;
                *payload = Some(Payload::Staged(locator));
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    Ok(())
}

async fn read_text(field: Field<'_>, limit: u64) -> Result<String> {
    field.text().await.map_err(|e| multipart_error(e, limit))
}

fn multipart_error(e: MultipartError, limit: u64) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit }
    } else {
        Error::Validation(format!("Malformed multipart body: {}", e.body_text()))
    }
}

/// `DELETE /api/photos/{id}`
pub async fn delete_photo(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> std::result::Result<StatusCode, AppError> {
    ctx.deletes.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
