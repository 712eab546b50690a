use crate::generation::registry::ResourceService;
use crate::generation::types::{Generation, ResourceKey};

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Stand-in resource for the admin API: logs its lifecycle and takes
/// `teardown` to release each generation.
pub struct DemoResource {
    teardown: Duration,
}

impl DemoResource {
    pub fn new(teardown: Duration) -> Self {
        Self { teardown }
    }
}

#[async_trait]
impl ResourceService for DemoResource {
    async fn start(&self, key: &ResourceKey, generation: Generation) -> Result<()> {
        tracing::info!("{} generation {} serving", key, generation);
        Ok(())
    }

    async fn stop(&self, key: &ResourceKey, generation: Generation) -> Result<()> {
        tracing::info!("{} generation {} stopped", key, generation);
        Ok(())
    }

    async fn release(&self, key: &ResourceKey, generation: Generation) -> Result<()> {
        tokio::time::sleep(self.teardown).await;
        tracing::info!(
            "{} generation {} released after {:?}",
            key,
            generation,
            self.teardown
        );
        Ok(())
    }
}
