pub mod device;
pub mod envelope;
pub mod error;
pub mod types;

pub use device::DeviceInfo;
pub use envelope::AuthPolicy;
pub use error::{CardOpsError, Result};
pub use types::{
    ApiFieldError, ApplicationBatch, ApplicationEntry, ApplicationFilter, ApplicationRecord,
    AuthOptions, BatchAction, BatchFilter, CardType, Corporate, DeliverTo, DraftCreated, EmbossType,
    ErrorReportRef, HealthReport, Page, Pageable, Permission, Product, StagingBatch,
    StagingRequest, StagingStatus, StagingStatusKind, UploadedFile, User,
};

use std::sync::RwLock;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use types::{
    BatchActionRequest, CorporateListRequest, CorporateProductsRequest, EmailRequest, Empty,
    ListRequest, LoginRequest, PageRequest, RequestBody, StagingBatchRef,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_HEALTH_URL: &str = "http://localhost:8080/api";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the card operations backend.
///
/// Session cookies set by `/auth/login` are kept in the client's cookie
/// store, so one instance represents one signed-in console.
pub struct CardOpsClient {
    client: reqwest::Client,
    base_url: String,
    health_url: String,
    device: RwLock<DeviceInfo>,
}

impl CardOpsClient {
    pub fn new(base_url: &str, health_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, health_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, health_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            health_url: health_url.trim_end_matches('/').to_string(),
            device: RwLock::new(DeviceInfo::detect()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current device metadata.
    pub fn device(&self) -> DeviceInfo {
        self.device
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    // --- Auth ---

    pub async fn auth_options(&self, email: &str) -> Result<AuthOptions> {
        let req = EmailRequest {
            email: email.to_string(),
        };
        self.post("/auth/options", &req, AuthPolicy::Redirect).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post_ack("/auth/login", &req, AuthPolicy::Redirect).await?;
        tracing::info!(email, "Logged in");
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.post_ack("/auth/logout", &Empty::default(), AuthPolicy::Redirect)
            .await
    }

    /// "Who am I" probe. A 401 here means "not logged in", not "session expired".
    pub async fn me(&self) -> Result<User> {
        self.post("/auth/me", &Empty::default(), AuthPolicy::Silent).await
    }

    // --- Catalog ---

    pub async fn list_corporates(&self) -> Result<Vec<Corporate>> {
        let req = CorporateListRequest {
            include_products: true,
        };
        self.post("/corporates/list", &req, AuthPolicy::Redirect).await
    }

    pub async fn list_corporate_products(&self, corporate_id: i64) -> Result<Vec<Product>> {
        let req = CorporateProductsRequest { corporate_id };
        self.post("/corporates/products", &req, AuthPolicy::Redirect)
            .await
    }

    // --- Staging ---

    /// Create a staging batch and start backend validation.
    pub async fn validate_draft(&self, req: &StagingRequest) -> Result<DraftCreated> {
        let created: DraftCreated = self
            .post("/applications/draft/validate", req, AuthPolicy::Redirect)
            .await?;
        tracing::info!(draft_id = created.draft_id, bulk = req.is_bulk, "Staging batch created");
        Ok(created)
    }

    pub async fn draft_status(&self, staging_batch_id: i64) -> Result<StagingStatus> {
        let req = StagingBatchRef { staging_batch_id };
        self.post("/applications/draft/validate/status", &req, AuthPolicy::Redirect)
            .await
    }

    /// List past staging batches. `page` is 0-based.
    pub async fn list_drafts(&self, page: u32, size: u32) -> Result<Page<StagingBatch>> {
        let req = PageRequest {
            page: page + 1,
            size,
        };
        self.post("/applications/draft/list", &req, AuthPolicy::Redirect)
            .await
    }

    pub async fn draft_errors(&self, staging_batch_id: i64) -> Result<ErrorReportRef> {
        let req = StagingBatchRef { staging_batch_id };
        self.post("/applications/draft/errors", &req, AuthPolicy::Redirect)
            .await
    }

    pub async fn submit_draft(&self, staging_batch_id: i64) -> Result<()> {
        let req = StagingBatchRef { staging_batch_id };
        self.post_ack("/applications/submit", &req, AuthPolicy::Redirect)
            .await?;
        tracing::info!(staging_batch_id, "Staging batch submitted");
        Ok(())
    }

    // --- Files ---

    /// Upload a bulk application file as multipart field `file`.
    pub async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> Result<UploadedFile> {
        let size = contents.len();
        let part = Part::bytes(contents).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let url = format!("{}/files/upload", self.base_url);
        let resp = self.client.post(&url).multipart(form).send().await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        let uploaded: UploadedFile =
            self.settle(envelope::decode(status, &body, AuthPolicy::Redirect))?;

        tracing::info!(file_name, size, stored_as = %uploaded.file_name, "File uploaded");
        Ok(uploaded)
    }

    pub async fn download_file(&self, file_name: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/files/download/{}",
            self.base_url,
            urlencoding::encode(file_name)
        );
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        self.settle(envelope::check_status(status, &body, AuthPolicy::Redirect))?;

        Ok(body.to_vec())
    }

    // --- Batches ---

    /// List application batches. `page` is 0-based.
    pub async fn list_batches(
        &self,
        filter: BatchFilter,
        page: u32,
        size: u32,
    ) -> Result<Page<ApplicationBatch>> {
        let req = ListRequest {
            filter,
            page: page + 1,
            size,
        };
        self.post("/applications/batch/list", &req, AuthPolicy::Redirect)
            .await
    }

    /// List application records. `page` is 0-based.
    pub async fn list_applications(
        &self,
        filter: ApplicationFilter,
        page: u32,
        size: u32,
    ) -> Result<Page<ApplicationRecord>> {
        let req = ListRequest {
            filter,
            page: page + 1,
            size,
        };
        self.post("/applications/list", &req, AuthPolicy::Redirect)
            .await
    }

    /// Request an approve/reject/cancel transition. The caller re-fetches
    /// afterwards; nothing is updated locally.
    pub async fn batch_action(&self, batch_id: i64, action: BatchAction, reason: &str) -> Result<()> {
        let req = BatchActionRequest {
            batch_id,
            action,
            reason: reason.to_string(),
        };
        self.post_ack("/application/batch/action", &req, AuthPolicy::Redirect)
            .await?;
        tracing::info!(batch_id, action = %action, "Batch action accepted");
        Ok(())
    }

    // --- Health ---

    /// Actuator health. Not wrapped in the envelope.
    pub async fn health(&self) -> Result<HealthReport> {
        let url = format!("{}/actuator/health", self.health_url);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        envelope::check_status(status, &body, AuthPolicy::Silent)?;

        Ok(serde_json::from_slice(&body)?)
    }

    // --- Plumbing ---

    async fn post<P: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &P,
        policy: AuthPolicy,
    ) -> Result<T> {
        let (status, body) = self.send(endpoint, payload).await?;
        self.settle(envelope::decode(status, &body, policy))
    }

    async fn post_ack<P: Serialize>(&self, endpoint: &str, payload: &P, policy: AuthPolicy) -> Result<()> {
        let (status, body) = self.send(endpoint, payload).await?;
        self.settle(envelope::decode_ack(status, &body, policy))
    }

    async fn send<P: Serialize>(
        &self,
        endpoint: &str,
        payload: &P,
    ) -> Result<(reqwest::StatusCode, bytes::Bytes)> {
        let device = self.device();
        let body = RequestBody {
            device: &device,
            payload,
        };

        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(endpoint, "POST");
        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        Ok((status, bytes))
    }

    /// Apply client-side effects of a decoded result. A forced logout drops
    /// the device identity along with the session.
    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(CardOpsError::SessionExpired) = &result {
            tracing::warn!("Session expired, rotating device id");
            let mut device = self
                .device
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *device = device.rotated();
        }
        result
    }
}
