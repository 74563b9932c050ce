#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Client;
use tempfile::TempDir;
use uuid::Uuid;

use family_photos::{
    auth::{IdentityVerifier, JwtService},
    entities::{
        photo::{Photo, PhotoDetails, PhotoInsert},
        tag::Tag,
        token::AuthResponse,
        user::{IdentityProfile, User, UserSummary},
    },
    errors::{AppError, AuthError},
    metadata::{Coordinates, LocationError, LocationResolver},
    middlewares::auth::AuthMiddleware,
    repositories::{photo::PhotoRepository, tag::TagRepository, user::UserRepository},
    routes::{configure_routes, upload_form_config},
    settings::{AppConfig, AppEnvironment},
    storage::{LocalStorage, StorageBackend},
    tags::normalize_tag,
    use_cases::{auth::AuthHandler, photos::PhotoHandler},
    AppState,
};

pub const MAX_UPLOAD_BYTES: usize = 64 * 1024;
pub const BOUNDARY: &str = "----family-photos-test-boundary";

/// A running server wired to in-memory repositories, fake external services
/// and a temporary upload directory.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub store: Arc<InMemoryStore>,
    pub locations: Arc<FakeLocationResolver>,
    pub upload_dir: TempDir,
    pub config: AppConfig,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = test_config();
        let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
        let storage = LocalStorage::new(upload_dir.path())
            .await
            .expect("Failed to create local storage");

        let store = Arc::new(InMemoryStore::default());
        let locations = Arc::new(FakeLocationResolver::default());

        let state = web::Data::new(AppState {
            auth_handler: AuthHandler::new(
                store.clone(),
                Arc::new(FakeIdentityVerifier),
                JwtService::new(&config),
            ),
            photo_handler: PhotoHandler::new(
                store.clone(),
                store.clone(),
                Arc::new(storage),
                locations.clone(),
                config.max_upload_bytes,
            ),
        });

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind test port");
        let port = listener.local_addr().expect("No local address").port();
        let address = format!("http://127.0.0.1:{}", port);

        let max_upload_bytes = config.max_upload_bytes;
        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .app_data(upload_form_config(max_upload_bytes))
                .wrap(AuthMiddleware)
                .wrap(NormalizePath::trim())
                .configure(configure_routes)
        })
        .listen(listener)
        .expect("Failed to bind server")
        .workers(1)
        .run();

        tokio::spawn(server);

        let client = Client::new();
        while client.get(format!("{}/", address)).send().await.is_err() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Self {
            address,
            client,
            store,
            locations,
            upload_dir,
            config,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Signs a family member in over HTTP.
    pub async fn sign_in(&self, name: &str) -> AuthResponse {
        self.client
            .post(self.url("/api/auth/google"))
            .json(&serde_json::json!({ "credential": FakeIdentityVerifier::credential_for(name) }))
            .send()
            .await
            .expect("Failed to sign in")
            .json()
            .await
            .expect("Invalid auth response")
    }

    pub async fn upload(
        &self,
        token: Option<&str>,
        file: Option<FilePart<'_>>,
        description: Option<&str>,
        tags: Option<&str>,
    ) -> reqwest::Response {
        let (content_type, body) = multipart_body(file, description, tags);
        let mut request = self.client
            .post(self.url("/api/photos/upload"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to upload")
    }

    pub fn stored_files(&self) -> Vec<String> {
        let mut files: Vec<String> = std::fs::read_dir(self.upload_dir.path())
            .expect("Failed to read upload dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        files
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        env: AppEnvironment::Testing,
        name: "Family Photos Test".to_string(),
        port: 0,
        host: "127.0.0.1".to_string(),
        worker_count: 1,
        database_url: "postgres://unused/test".into(),
        cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        frontend_url: None,
        jwt_secret: "test_jwt_secret_that_is_long_enough_for_hs512_1234567890".into(),
        jwt_expiration_minutes: 60,
        google_client_id: "test-client.apps.googleusercontent.com".into(),
        google_certs_url: "http://127.0.0.1:9/certs".into(),
        storage_backend: StorageBackend::Local,
        upload_dir: "unused".into(),
        gcs_bucket: None,
        gcs_credentials_path: None,
        gcs_public_base_url: "https://storage.googleapis.com".into(),
        max_upload_bytes: MAX_UPLOAD_BYTES,
        geocoding_url: "http://127.0.0.1:9".into(),
        geocoding_user_agent: "family-photos-tests".into(),
        geocoding_timeout_secs: 1,
    }
}

/// Accepts credentials of the form `valid:{name}`.
pub struct FakeIdentityVerifier;

impl FakeIdentityVerifier {
    pub fn credential_for(name: &str) -> String {
        format!("valid:{}", name)
    }
}

#[async_trait]
impl IdentityVerifier for FakeIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<IdentityProfile, AuthError> {
        let name = credential.strip_prefix("valid:").ok_or(AuthError::InvalidToken)?;

        Ok(IdentityProfile {
            google_sub: format!("sub-{}", name.to_lowercase()),
            email: format!("{}@example.com", name.to_lowercase()),
            name: name.to_string(),
            avatar_url: None,
        })
    }
}

#[derive(Default)]
pub struct FakeLocationResolver {
    pub place: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl FakeLocationResolver {
    pub fn answer_with(&self, place: &str) {
        *self.place.lock() = Some(place.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationResolver for FakeLocationResolver {
    async fn resolve(&self, _coordinates: Coordinates) -> Result<Option<String>, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.place.lock().clone())
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tags: Vec<Tag>,
    photos: Vec<Photo>,
    links: Vec<(Uuid, Uuid)>,
}

/// Implements every repository over plain vectors.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn photo_count(&self) -> usize {
        self.tables.lock().photos.len()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tables.lock().tags.iter().map(|t| t.name.clone()).collect()
    }

    fn details(tables: &Tables, photo: &Photo) -> PhotoDetails {
        let owner = tables
            .users
            .iter()
            .find(|u| u.id == photo.user_id)
            .map(UserSummary::from)
            .expect("photo owner exists");

        PhotoDetails {
            photo: photo.clone(),
            owner,
            tags: Self::tags_of(tables, &photo.id),
        }
    }

    fn tags_of(tables: &Tables, photo_id: &Uuid) -> Vec<Tag> {
        let mut tags: Vec<Tag> = tables
            .links
            .iter()
            .filter(|(p, _)| p == photo_id)
            .filter_map(|(_, t)| tables.tags.iter().find(|tag| tag.id == *t).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_or_create_user(&self, profile: &IdentityProfile) -> Result<User, AppError> {
        let mut tables = self.tables.lock();

        if let Some(user) = tables.users.iter_mut().find(|u| u.google_sub == profile.google_sub) {
            user.email = profile.email.clone();
            user.name = profile.name.clone();
            user.avatar_url = profile.avatar_url.clone();
            user.updated_at = Utc::now();
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            google_sub: profile.google_sub.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.lock().users.iter().find(|u| u.id == *id).cloned())
    }
}

#[async_trait]
impl TagRepository for InMemoryStore {
    async fn upsert_tag(&self, name: &str) -> Result<Tag, AppError> {
        let name = normalize_tag(name)
            .ok_or_else(|| AppError::InvalidInput("Tag name cannot be empty".to_string()))?;
        let mut tables = self.tables.lock();

        if let Some(tag) = tables.tags.iter().find(|t| t.name == name) {
            return Ok(tag.clone());
        }

        let tag = Tag { id: Uuid::new_v4(), name };
        tables.tags.push(tag.clone());
        Ok(tag)
    }

    async fn list_tag_names(&self) -> Result<Vec<String>, AppError> {
        let mut names = self.tag_names();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl PhotoRepository for InMemoryStore {
    async fn check_connection(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_photo(&self, insert: &PhotoInsert, tag_ids: &[Uuid]) -> Result<Photo, AppError> {
        let mut tables = self.tables.lock();

        let photo = Photo {
            id: Uuid::new_v4(),
            filename: insert.filename.clone(),
            original_name: insert.original_name.clone(),
            description: insert.description.clone(),
            storage_url: insert.storage_url.clone(),
            user_id: insert.user_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        tables.photos.push(photo.clone());
        for tag_id in tag_ids {
            if !tables.links.contains(&(photo.id, *tag_id)) {
                tables.links.push((photo.id, *tag_id));
            }
        }
        Ok(photo)
    }

    async fn list_photos(&self, tag_filter: &[String]) -> Result<Vec<PhotoDetails>, AppError> {
        let tables = self.tables.lock();

        let mut photos: Vec<PhotoDetails> = tables
            .photos
            .iter()
            .rev()
            .map(|photo| Self::details(&tables, photo))
            .filter(|details| {
                tag_filter.is_empty() || details.tags.iter().any(|t| tag_filter.contains(&t.name))
            })
            .collect();
        photos.sort_by(|a, b| b.photo.created_at.cmp(&a.photo.created_at));
        Ok(photos)
    }

    async fn get_photo(&self, id: &Uuid) -> Result<Option<PhotoDetails>, AppError> {
        let tables = self.tables.lock();
        Ok(tables
            .photos
            .iter()
            .find(|p| p.id == *id)
            .map(|photo| Self::details(&tables, photo)))
    }

    async fn delete_photo(&self, id: &Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.lock();
        let before = tables.photos.len();
        tables.photos.retain(|p| p.id != *id);
        if tables.photos.len() == before {
            return Err(AppError::NotFound("Photo not found".to_string()));
        }
        tables.links.retain(|(p, _)| p != id);
        Ok(())
    }

    async fn attach_tag(&self, photo_id: &Uuid, tag_id: &Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.lock();
        if !tables.photos.iter().any(|p| p.id == *photo_id) {
            return Err(AppError::NotFound("Photo not found".to_string()));
        }
        if !tables.links.contains(&(*photo_id, *tag_id)) {
            tables.links.push((*photo_id, *tag_id));
        }
        Ok(())
    }

    async fn detach_tag(&self, photo_id: &Uuid, name: &str) -> Result<(), AppError> {
        let mut tables = self.tables.lock();
        let tag_id = tables.tags.iter().find(|t| t.name == name).map(|t| t.id);
        if let Some(tag_id) = tag_id {
            tables.links.retain(|link| *link != (*photo_id, tag_id));
        }
        Ok(())
    }

    async fn photo_tags(&self, photo_id: &Uuid) -> Result<Vec<Tag>, AppError> {
        Ok(Self::tags_of(&self.tables.lock(), photo_id))
    }
}

/// A file part for [`multipart_body`].
pub struct FilePart<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

/// Builds a `multipart/form-data` body the way a browser `FormData` would.
pub fn multipart_body(
    file: Option<FilePart<'_>>,
    description: Option<&str>,
    tags: Option<&str>,
) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    if let Some(file) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"photo\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.filename, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }

    for (name, value) in [("description", description), ("tags", tags)] {
        if let Some(value) = value {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n", name, value).as_bytes(),
            );
        }
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// Smallest byte sequence `infer` recognises as a JPEG.
pub fn jpeg_bytes(marker: u8) -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, marker]
}

/// A bare TIFF whose only EXIF content is a GPS position near Sydney.
pub fn tiff_with_gps() -> Vec<u8> {
    use exif::experimental::Writer;
    use exif::{Field, In, Rational, Tag as ExifTag, Value};

    let dms = |d, m, s| Value::Rational(vec![
        Rational { num: d, denom: 1 },
        Rational { num: m, denom: 1 },
        Rational { num: s, denom: 1 },
    ]);
    let fields = [
        Field { tag: ExifTag::GPSLatitudeRef, ifd_num: In::PRIMARY, value: Value::Ascii(vec![b"S".to_vec()]) },
        Field { tag: ExifTag::GPSLatitude, ifd_num: In::PRIMARY, value: dms(33, 51, 36) },
        Field { tag: ExifTag::GPSLongitudeRef, ifd_num: In::PRIMARY, value: Value::Ascii(vec![b"E".to_vec()]) },
        Field { tag: ExifTag::GPSLongitude, ifd_num: In::PRIMARY, value: dms(151, 12, 36) },
    ];

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    writer.write(&mut buf, false).expect("Failed to write TIFF");
    buf.into_inner()
}
