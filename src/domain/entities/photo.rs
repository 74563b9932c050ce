use actix_multipart::form::{bytes::Bytes as FilePart, text::Text, MultipartForm};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::LOCAL_FILE_ROUTE;
use crate::entities::tag::Tag;
use crate::entities::user::UserSummary;

pub const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub description: Option<String>,
    pub storage_url: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    /// The cloud URL when the photo lives in object storage, otherwise the
    /// API path that serves the local file.
    pub fn url(&self) -> String {
        self.storage_url
            .clone()
            .unwrap_or_else(|| format!("{}/{}", LOCAL_FILE_ROUTE, self.filename))
    }
}

#[derive(Debug, Clone)]
pub struct PhotoInsert {
    pub filename: String,
    pub original_name: String,
    pub description: Option<String>,
    pub storage_url: Option<String>,
    pub user_id: Uuid,
}

/// A photo with its uploader and tags, as loaded by the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoDetails {
    pub photo: Photo,
    pub owner: UserSummary,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub description: Option<String>,
    pub url: String,
    pub storage_url: Option<String>,
    pub tags: Vec<Tag>,
    pub user: UserSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PhotoDetails> for PhotoResponse {
    fn from(details: PhotoDetails) -> Self {
        let url = details.photo.url();
        let photo = details.photo;

        PhotoResponse {
            id: photo.id,
            filename: photo.filename,
            original_name: photo.original_name,
            description: photo.description,
            url,
            storage_url: photo.storage_url,
            tags: details.tags,
            user: details.owner,
            created_at: photo.created_at,
            updated_at: photo.updated_at,
        }
    }
}

/// Multipart body of `POST /api/photos/upload`.
#[derive(Debug, MultipartForm)]
pub struct PhotoUploadForm {
    pub photo: Option<FilePart>,
    pub description: Option<Text<String>>,
    /// JSON array of tag names.
    pub tags: Option<Text<String>>,
}

/// An upload after it has been read off the wire.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub original_name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

impl NewPhoto {
    /// `None` when the request carried no `photo` part.
    pub fn from_form(form: PhotoUploadForm) -> Option<Self> {
        let PhotoUploadForm { photo, description, tags } = form;
        let photo = photo?;

        Some(NewPhoto {
            content_type: photo.content_type.as_ref().map(|ct| ct.essence_str().to_string()),
            original_name: photo.file_name,
            data: photo.data,
            description: description.map(|text| text.0),
            tags: tags.map(|text| text.0),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePhotoResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(storage_url: Option<&str>) -> Photo {
        Photo {
            id: Uuid::new_v4(),
            filename: "1718000000000-42.jpg".into(),
            original_name: "beach.jpg".into(),
            description: None,
            storage_url: storage_url.map(Into::into),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn local_photos_resolve_to_file_route() {
        assert_eq!(photo(None).url(), "/api/photos/file/1718000000000-42.jpg");
    }

    #[test]
    fn stored_url_wins_over_file_route() {
        let url = "https://storage.googleapis.com/family/1718000000000-42.jpg";

        assert_eq!(photo(Some(url)).url(), url);
    }

    #[test]
    fn response_serializes_camel_case() {
        let owner = UserSummary {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            avatar_url: None,
        };
        let response = PhotoResponse::from(PhotoDetails { photo: photo(None), owner, tags: vec![] });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["originalName"], "beach.jpg");
        assert_eq!(json["url"], "/api/photos/file/1718000000000-42.jpg");
        assert!(json["storageUrl"].is_null());
        assert!(json.get("createdAt").is_some());
    }
}
