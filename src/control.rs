use crate::catalog::{CatalogService, ListCategories, ListProducts, SearchProducts};
use actix::prelude::*;
use actix_web::{
    get,
    web::{self, Data, Query},
    HttpResponse,
};
use anyhow::Context;
use derive_more::{Display, Error};
use serde::Deserialize;

pub type Response = Result<HttpResponse, ControllerError>;

#[derive(Debug, Display, Error)]
pub enum ControllerError {
    #[error(ignore)]
    #[display("Failed to discover categories")]
    CategoriesUnavailable(anyhow::Error),
    #[error(ignore)]
    #[display("Failed to scrape products")]
    ProductsUnavailable(anyhow::Error),
    #[error(ignore)]
    InternalServerError(anyhow::Error),
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalServerError(err)
    }
}

impl From<actix::MailboxError> for ControllerError {
    fn from(err: actix::MailboxError) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl actix_web::error::ResponseError for ControllerError {
    fn error_response(&self) -> HttpResponse {
        use ControllerError::*;
        let error = match self {
            CategoriesUnavailable(err) | ProductsUnavailable(err) => {
                log::error!("{self}: {err:?}");
                self.to_string()
            }
            InternalServerError(err) => {
                log::error!("{err:?}");
                "Internal server error".to_string()
            }
        };
        HttpResponse::InternalServerError().json(serde_json::json!({ "error": error }))
    }
}

#[derive(Deserialize)]
pub struct ProductsQuery {
    pub categories: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[get("/categories")]
async fn list_categories(catalog: Data<Addr<CatalogService>>) -> Response {
    let categories = catalog
        .send(ListCategories)
        .await
        .context("Unable to send message to CatalogService")?
        .map_err(ControllerError::CategoriesUnavailable)?;
    Ok(HttpResponse::Ok().json(categories))
}

#[get("/products")]
async fn list_products(
    catalog: Data<Addr<CatalogService>>,
    Query(ProductsQuery { categories: filter }): Query<ProductsQuery>,
) -> Response {
    let products = catalog
        .send(ListProducts(filter))
        .await
        .context("Unable to send message to CatalogService")?
        .map_err(ControllerError::ProductsUnavailable)?;
    Ok(HttpResponse::Ok().json(&*products))
}

#[get("/products/search")]
async fn search_products(
    catalog: Data<Addr<CatalogService>>,
    Query(SearchQuery { q }): Query<SearchQuery>,
) -> Response {
    let found = catalog
        .send(SearchProducts(q))
        .await
        .context("Unable to send message to CatalogService")?
        .map_err(ControllerError::ProductsUnavailable)?;
    Ok(HttpResponse::Ok().json(found))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_categories)
        .service(search_products)
        .service(list_products)
        .service(health);
}
