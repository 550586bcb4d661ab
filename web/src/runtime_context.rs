use std::sync::Arc;

use anyhow::Result;

use crate::config::RuntimeConfig;
use crate::gemini_client::GeminiClient;
use crate::upload_policy::UploadPolicy;
use crate::upload_storage::UploadStorage;

pub struct RuntimeContext {
    config: RuntimeConfig,
    upload_policy: UploadPolicy,
    upload_storage: UploadStorage,
    gemini_client: Arc<GeminiClient>,
}

impl RuntimeContext {
    pub async fn new(config: RuntimeConfig) -> Result<Arc<Self>> {
        let gemini_client = GeminiClient::new(&config.gemini)?;
        let upload_storage = UploadStorage::open(&config.storage).await?;
        let upload_policy = UploadPolicy::new(config.max_upload_bytes, config.strict_uploads);
        let context = Self {
            config,
            upload_policy,
            upload_storage,
            gemini_client,
        };
        Ok(Arc::new(context))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.upload_policy
    }

    pub fn upload_storage(&self) -> &UploadStorage {
        &self.upload_storage
    }

    pub fn gemini_client(&self) -> &Arc<GeminiClient> {
        &self.gemini_client
    }
}
