use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use uuid::Uuid;
use validator::Validate;

use crate::entities::photo::{
    DeletePhotoResponse, NewPhoto, PhotoDetails, PhotoInsert, PhotoResponse, MAX_DESCRIPTION_CHARS,
};
use crate::entities::tag::{Tag, TagRequest};
use crate::errors::AppError;
use crate::metadata::{extract_coordinates, LocationResolver};
use crate::repositories::{photo::PhotoRepository, tag::TagRepository};
use crate::storage::{PhotoStorage, StoredPhoto};
use crate::tags::{normalize_tag, parse_tag_list};
use crate::utils::valid_uuid::valid_uuid;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

pub struct PhotoHandler {
    pub photo_repo: Arc<dyn PhotoRepository>,
    pub tag_repo: Arc<dyn TagRepository>,
    pub storage: Arc<dyn PhotoStorage>,
    pub locations: Arc<dyn LocationResolver>,
    pub max_upload_bytes: usize,
}

impl PhotoHandler {
    pub fn new(
        photo_repo: Arc<dyn PhotoRepository>,
        tag_repo: Arc<dyn TagRepository>,
        storage: Arc<dyn PhotoStorage>,
        locations: Arc<dyn LocationResolver>,
        max_upload_bytes: usize,
    ) -> Self {
        PhotoHandler {
            photo_repo,
            tag_repo,
            storage,
            locations,
            max_upload_bytes,
        }
    }

    /// Validates, enriches, stores and records an uploaded photo.
    ///
    /// Nothing is written to storage unless the upload is a well formed
    /// image request.
    pub async fn upload(&self, owner_id: Uuid, upload: NewPhoto) -> Result<PhotoResponse, AppError> {
        if upload.data.is_empty() {
            return Err(AppError::InvalidInput("No file uploaded".to_string()));
        }
        if upload.data.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Photos may be at most {} bytes",
                self.max_upload_bytes
            )));
        }

        let content_type = upload
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| ct.to_ascii_lowercase().starts_with("image/"))
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("Only image files are allowed".to_string()))?;

        let description = upload
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        if description.as_ref().is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS) {
            return Err(AppError::InvalidInput(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }

        let mut tags = parse_tag_list(upload.tags.as_deref())?;
        if let Some(place) = self.location_tag(&upload.data).await {
            if !tags.contains(&place) {
                tracing::debug!(tag = %place, "Adding location tag");
                tags.push(place);
            }
        }

        let filename = generate_filename(upload.original_name.as_deref(), &upload.data, &content_type);
        let original_name = upload
            .original_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| filename.clone());

        let stored = self.storage
            .store(&filename, &content_type, upload.data)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, filename = %filename, "Failed to store photo");
                AppError::from(e)
            })?;

        let insert = PhotoInsert {
            filename: stored.key.clone(),
            original_name,
            description,
            storage_url: stored.public_url.clone(),
            user_id: owner_id,
        };

        match self.record(&insert, &tags).await {
            Ok(details) => {
                tracing::info!(
                    photo_id = %details.photo.id,
                    user_id = %owner_id,
                    filename = %details.photo.filename,
                    tag_count = details.tags.len(),
                    backend = %self.storage.backend(),
                    "Photo uploaded"
                );
                Ok(details.into())
            }
            Err(e) => {
                self.discard(&stored).await;
                Err(e)
            }
        }
    }

    async fn record(&self, insert: &PhotoInsert, tags: &[String]) -> Result<PhotoDetails, AppError> {
        let mut tag_ids = Vec::with_capacity(tags.len());
        for name in tags {
            tag_ids.push(self.tag_repo.upsert_tag(name).await?.id);
        }

        let photo = self.photo_repo.create_photo(insert, &tag_ids).await?;

        self.photo_repo
            .get_photo(&photo.id)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("photo {} missing after insert", photo.id)))
    }

    /// Best effort removal of a file whose database record was never written.
    async fn discard(&self, stored: &StoredPhoto) {
        if let Err(e) = self.storage.remove(&stored.key).await {
            tracing::warn!(error = %e, filename = %stored.key, "Failed to remove orphaned photo file");
        }
    }

    async fn location_tag(&self, data: &[u8]) -> Option<String> {
        let coordinates = extract_coordinates(data)?;

        match self.locations.resolve(coordinates).await {
            Ok(Some(place)) => normalize_tag(&place),
            Ok(None) => {
                tracing::debug!(
                    latitude = coordinates.latitude,
                    longitude = coordinates.longitude,
                    "No place name for photo coordinates"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reverse geocoding failed, continuing without location tag");
                None
            }
        }
    }

    pub async fn list_photos(&self, tag_filter: &[String]) -> Result<Vec<PhotoResponse>, AppError> {
        let photos = self.photo_repo.list_photos(tag_filter).await?;
        Ok(photos.into_iter().map(PhotoResponse::from).collect())
    }

    pub async fn get_photo(&self, id: &str) -> Result<PhotoResponse, AppError> {
        self.find(id).await.map(PhotoResponse::from)
    }

    async fn find(&self, id: &str) -> Result<PhotoDetails, AppError> {
        let id = valid_uuid(id)?;
        self.photo_repo
            .get_photo(&id)
            .await?
            .ok_or_else(|| AppError::NotFound("Photo not found".to_string()))
    }

    /// Raw bytes of a stored photo and a content type sniffed from them.
    pub async fn read_file(&self, filename: &str) -> Result<(Bytes, &'static str), AppError> {
        let data = self.storage.read(filename).await?;
        let content_type = infer::get(&data)
            .map(|kind| kind.mime_type())
            .unwrap_or(FALLBACK_CONTENT_TYPE);

        Ok((data, content_type))
    }

    /// Deletes a photo owned by `caller`. The file goes first; if that fails
    /// the record is still removed and the response carries a warning.
    pub async fn delete_photo(&self, id: &str, caller: Uuid) -> Result<DeletePhotoResponse, AppError> {
        let details = self.find(id).await?;
        let photo = details.photo;

        if photo.user_id != caller {
            tracing::warn!(photo_id = %photo.id, user_id = %caller, "Refused to delete another user's photo");
            return Err(AppError::ForbiddenAccess);
        }

        let warning = match self.storage.remove(&photo.filename).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, photo_id = %photo.id, filename = %photo.filename, "Failed to remove photo file");
                Some("Photo record deleted but its file could not be removed from storage".to_string())
            }
        };

        self.photo_repo.delete_photo(&photo.id).await?;
        tracing::info!(photo_id = %photo.id, user_id = %caller, "Photo deleted");

        Ok(DeletePhotoResponse {
            message: "Photo deleted successfully".to_string(),
            warning,
        })
    }

    pub async fn add_tag(&self, id: &str, request: TagRequest) -> Result<Vec<Tag>, AppError> {
        let name = requested_tag(&request)?;
        let photo = self.find(id).await?.photo;

        let tag = self.tag_repo.upsert_tag(&name).await?;
        self.photo_repo.attach_tag(&photo.id, &tag.id).await?;

        self.photo_repo.photo_tags(&photo.id).await
    }

    pub async fn remove_tag(&self, id: &str, request: TagRequest) -> Result<Vec<Tag>, AppError> {
        let name = requested_tag(&request)?;
        let photo = self.find(id).await?.photo;

        self.photo_repo.detach_tag(&photo.id, &name).await?;

        self.photo_repo.photo_tags(&photo.id).await
    }

    pub async fn list_tags(&self) -> Result<Vec<String>, AppError> {
        self.tag_repo.list_tag_names().await
    }
}

fn requested_tag(request: &TagRequest) -> Result<String, AppError> {
    request.validate()?;
    normalize_tag(&request.tag)
        .ok_or_else(|| AppError::InvalidInput("Tag name cannot be empty".to_string()))
}

/// `{unix millis}-{random}{.ext}`, unique enough to never collide in practice.
pub fn generate_filename(original_name: Option<&str>, data: &[u8], content_type: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);

    match file_extension(original_name, data, content_type) {
        Some(ext) => format!("{}-{}.{}", millis, suffix, ext),
        None => format!("{}-{}", millis, suffix),
    }
}

fn file_extension(original_name: Option<&str>, data: &[u8], content_type: &str) -> Option<String> {
    let usable = |ext: &str| {
        let ext = ext.to_ascii_lowercase();
        (!ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .then_some(ext)
    };

    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .and_then(usable)
        .or_else(|| infer::get(data).and_then(|kind| usable(kind.extension())))
        .or_else(|| {
            content_type
                .split_once('/')
                .map(|(_, subtype)| subtype.split(['+', ';']).next().unwrap_or_default())
                .and_then(usable)
        })
}
