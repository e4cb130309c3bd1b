// Backend seam for the console.
//
// Views and workflows talk to `ConsoleApi`, never to the HTTP client
// directly. `CardOpsClient` is the production implementation;
// `testing::ScriptedApi` replays canned responses.

use async_trait::async_trait;

use cardops_client::{
    ApplicationBatch, ApplicationFilter, ApplicationRecord, AuthOptions, BatchAction, BatchFilter,
    CardOpsClient, Corporate, DraftCreated, ErrorReportRef, HealthReport, Page, Product, Result,
    StagingBatch, StagingRequest, StagingStatus, UploadedFile, User,
};

#[async_trait]
pub trait ConsoleApi: Send + Sync {
    async fn auth_options(&self, email: &str) -> Result<AuthOptions>;
    async fn login(&self, email: &str, password: &str) -> Result<()>;
    async fn logout(&self) -> Result<()>;

    /// Current user. Must not trigger the session-expired path on 401.
    async fn me(&self) -> Result<User>;

    async fn list_corporates(&self) -> Result<Vec<Corporate>>;
    async fn list_corporate_products(&self, corporate_id: i64) -> Result<Vec<Product>>;

    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> Result<UploadedFile>;
    async fn download_file(&self, file_name: &str) -> Result<Vec<u8>>;

    async fn validate_draft(&self, req: &StagingRequest) -> Result<DraftCreated>;
    async fn draft_status(&self, staging_batch_id: i64) -> Result<StagingStatus>;
    async fn list_drafts(&self, page: u32, size: u32) -> Result<Page<StagingBatch>>;
    async fn draft_errors(&self, staging_batch_id: i64) -> Result<ErrorReportRef>;
    async fn submit_draft(&self, staging_batch_id: i64) -> Result<()>;

    async fn list_batches(&self, filter: BatchFilter, page: u32, size: u32)
        -> Result<Page<ApplicationBatch>>;
    async fn list_applications(
        &self,
        filter: ApplicationFilter,
        page: u32,
        size: u32,
    ) -> Result<Page<ApplicationRecord>>;
    async fn batch_action(&self, batch_id: i64, action: BatchAction, reason: &str) -> Result<()>;

    async fn health(&self) -> Result<HealthReport>;
}

#[async_trait]
impl ConsoleApi for CardOpsClient {
    async fn auth_options(&self, email: &str) -> Result<AuthOptions> {
        self.auth_options(email).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<()> {
        self.login(email, password).await
    }

    async fn logout(&self) -> Result<()> {
        self.logout().await
    }

    async fn me(&self) -> Result<User> {
        self.me().await
    }

    async fn list_corporates(&self) -> Result<Vec<Corporate>> {
        self.list_corporates().await
    }

    async fn list_corporate_products(&self, corporate_id: i64) -> Result<Vec<Product>> {
        self.list_corporate_products(corporate_id).await
    }

    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> Result<UploadedFile> {
        self.upload_file(file_name, contents).await
    }

    async fn download_file(&self, file_name: &str) -> Result<Vec<u8>> {
        self.download_file(file_name).await
    }

    async fn validate_draft(&self, req: &StagingRequest) -> Result<DraftCreated> {
        self.validate_draft(req).await
    }

    async fn draft_status(&self, staging_batch_id: i64) -> Result<StagingStatus> {
        self.draft_status(staging_batch_id).await
    }

    async fn list_drafts(&self, page: u32, size: u32) -> Result<Page<StagingBatch>> {
        self.list_drafts(page, size).await
    }

    async fn draft_errors(&self, staging_batch_id: i64) -> Result<ErrorReportRef> {
        self.draft_errors(staging_batch_id).await
    }

    async fn submit_draft(&self, staging_batch_id: i64) -> Result<()> {
        self.submit_draft(staging_batch_id).await
    }

    async fn list_batches(
        &self,
        filter: BatchFilter,
        page: u32,
        size: u32,
    ) -> Result<Page<ApplicationBatch>> {
        self.list_batches(filter, page, size).await
    }

    async fn list_applications(
        &self,
        filter: ApplicationFilter,
        page: u32,
        size: u32,
    ) -> Result<Page<ApplicationRecord>> {
        self.list_applications(filter, page, size).await
    }

    async fn batch_action(&self, batch_id: i64, action: BatchAction, reason: &str) -> Result<()> {
        self.batch_action(batch_id, action, reason).await
    }

    async fn health(&self) -> Result<HealthReport> {
        self.health().await
    }
}
