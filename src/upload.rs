use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::config::{SequenceTarget, UploadConfig};
use crate::error::{GeotagError, Result};
use crate::pipeline::list_images;

const CSRF_COOKIE: &str = "csrftoken";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UploadSummary {
    pub sequence: String,
    pub uploaded: usize,
    /// First image the backend refused, with the HTTP status it answered
    pub rejected: Option<(PathBuf, u16)>,
}

/// Session client for the panorama backend.
///
/// Basic auth on every request plus a CSRF token taken from the session
/// cookie set by the admin login page. Uploads stop at the first image the
/// backend does not answer with 201 Created.
pub struct PanoramaUploader {
    client: reqwest::Client,
    backend: String,
    user: String,
    password: String,
    csrf_token: String,
}

impl PanoramaUploader {
    pub fn new(backend: &str, user: &str, password: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("photo_geotag/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(PanoramaUploader {
            client,
            backend: backend.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            csrf_token: String::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        endpoint(&self.backend, path)
    }

    /// Opens the session; a missing CSRF cookie leaves the token empty.
    pub async fn login(&mut self) -> Result<()> {
        let response = self
            .client
            .get(self.endpoint("admin/login"))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;

        self.csrf_token = response
            .cookies()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| c.value().to_string())
            .unwrap_or_default();

        if self.csrf_token.is_empty() {
            log::warn!("Login to {} returned no {} cookie", self.backend, CSRF_COOKIE);
        } else {
            log::debug!("Session opened on {}", self.backend);
        }
        Ok(())
    }

    pub async fn create_sequence(&self, title: &str, height_from_ground: f64) -> Result<String> {
        let keys: Value = self
            .client
            .get(self.endpoint("userkeys"))
            .basic_auth(&self.user, Some(&self.password))
            .query(&[("username", self.user.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let creator_key = parse_userkey(&keys)?;

        let form = [
            ("creator_key", creator_key),
            ("title", title.to_string()),
            ("height_from_ground", height_from_ground.to_string()),
            ("csrfmiddlewaretoken", self.csrf_token.clone()),
        ];
        let created: Value = self
            .client
            .post(self.endpoint("sequences"))
            .basic_auth(&self.user, Some(&self.password))
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let id = parse_sequence_id(&created)?;
        log::info!("Created sequence {:?} ({})", title, id);
        Ok(id)
    }

    /// Returns the backend's status; only 201 counts as stored.
    pub async fn upload_image(&self, image: &Path, sequence: &str) -> Result<StatusCode> {
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(image).await?;

        let form = Form::new()
            .part("eqimage", Part::bytes(bytes).file_name(file_name))
            .text("sequence", sequence.to_string())
            .text("csrfmiddlewaretoken", self.csrf_token.clone());

        let response = self
            .client
            .post(self.endpoint("panoramas"))
            .basic_auth(&self.user, Some(&self.password))
            .multipart(form)
            .send()
            .await?;
        Ok(response.status())
    }

    pub async fn upload_folder(&self, dir: &Path, sequence: &str) -> Result<UploadSummary> {
        let images = list_images(dir)?;
        let mut summary = UploadSummary {
            sequence: sequence.to_string(),
            ..Default::default()
        };

        for (i, image) in images.iter().enumerate() {
            let status = self.upload_image(image, sequence).await?;
            log::info!("[{}/{}] {} -> {}", i + 1, images.len(), image.display(), status);
            if status != StatusCode::CREATED {
                log::warn!("Backend refused {}, stopping upload", image.display());
                summary.rejected = Some((image.clone(), status.as_u16()));
                break;
            }
            summary.uploaded += 1;
        }

        Ok(summary)
    }
}

/// The `upload` command.
pub async fn run_upload(config: &UploadConfig) -> Result<UploadSummary> {
    let mut uploader = PanoramaUploader::new(&config.backend, &config.user, &config.password)?;
    uploader.login().await?;

    let sequence = match &config.sequence {
        SequenceTarget::Existing(id) => id.clone(),
        SequenceTarget::New { title } => {
            uploader
                .create_sequence(title, config.height_from_ground)
                .await?
        }
    };

    uploader.upload_folder(&config.images_dir, &sequence).await
}

/// `<base>/<path>/`, the trailing slash the backend routes expect
fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}/", base.trim_end_matches('/'), path.trim_matches('/'))
}

fn parse_userkey(body: &Value) -> Result<String> {
    body["results"][0]["key"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GeotagError::Upload(format!("no user key in response: {body}")))
}

/// Sequence ids come back as UUID strings or integers depending on the backend.
fn parse_sequence_id(body: &Value) -> Result<String> {
    match &body["id"] {
        Value::String(id) => Ok(id.clone()),
        Value::Number(id) => Ok(id.to_string()),
        _ => Err(GeotagError::Upload(format!(
            "no sequence id in response: {body}"
        ))),
    }
}
