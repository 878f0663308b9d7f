use crate::config::Config;
use anyhow::Context;
use async_trait::async_trait;
use crawler_types::browser::{Browser, Page};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

static DEFAULT_ACCEPT_ENCODING: &str = "br;q=1.0, gzip;q=0.6, deflate;q=0.4, *;q=0.2";
static DEFAULT_ACCEPT_LANGUAGE: &str = "de-AT,de;q=0.9,en;q=0.5";
static USER_AGENT: &str = concat!("gastro-crawler/", env!("CARGO_PKG_VERSION"));

pub fn build_client(config: &Config) -> Result<ClientWithMiddleware, anyhow::Error> {
    let mut map = HeaderMap::new();
    map.append(
        reqwest::header::ACCEPT_ENCODING,
        HeaderValue::from_str(DEFAULT_ACCEPT_ENCODING)?,
    );
    map.append(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_str(DEFAULT_ACCEPT_LANGUAGE)?,
    );
    let client = reqwest::ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.navigation_timeout)
        .use_rustls_tls()
        .cookie_store(true)
        .user_agent(USER_AGENT)
        .default_headers(map)
        .build()
        .context("Unable to build http client")?;
    // no retry middleware: a failed navigation is reported, never repeated
    Ok(ClientBuilder::new(client).build())
}

/// Page driver over plain HTTP. Serves the server-rendered document, so the
/// content never changes between polls.
#[derive(Clone)]
pub struct HttpBrowser {
    client: ClientWithMiddleware,
}

impl HttpBrowser {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>, anyhow::Error> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            document: None,
        }))
    }
}

pub struct HttpPage {
    client: ClientWithMiddleware,
    document: Option<String>,
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str) -> Result<(), anyhow::Error> {
        self.document = None;
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        self.document = Some(body);
        Ok(())
    }

    async fn content(&mut self) -> Result<String, anyhow::Error> {
        self.document
            .clone()
            .ok_or(anyhow::anyhow!("No document loaded"))
    }
}
