use async_trait::async_trait;

/// A single navigation context. Navigations on one page are strictly serial.
#[async_trait]
pub trait Page: Send {
    /// Navigates to `url`. Bounded by the driver's own navigation timeout.
    async fn goto(&mut self, url: &str) -> Result<(), anyhow::Error>;

    /// HTML of the current document as rendered right now.
    async fn content(&mut self) -> Result<String, anyhow::Error>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>, anyhow::Error>;
}
