use actix::prelude::*;
use actix_cors::Cors;
use actix_web::{web::Data, App, HttpServer};
use anyhow::Context as AnyhowContext;
use gastro_crawler::browser::{build_client, HttpBrowser};
use gastro_crawler::cache::SystemClock;
use gastro_crawler::catalog::{Catalog, CatalogService};
use gastro_crawler::config::{load_dotenv, Config};
use gastro_crawler::control;
use std::env;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO,html5ever=error");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    load_dotenv()?;
    let config = Config::from_env()?;
    log::info!("Upstream site {}", config.base_url);

    let browser = HttpBrowser::new(build_client(&config)?);
    let catalog = Catalog::new(Arc::new(browser), &config, Arc::new(SystemClock));
    let catalog_service = CatalogService::new(Arc::new(catalog), config.warm_up).start();

    let addr = (config.bind_addr.clone(), config.port);
    log::info!("Listening on {}:{}", addr.0, addr.1);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(Data::new(catalog_service.clone()))
            .configure(control::configure)
    })
    .bind(addr.clone())
    .context(format!("Unable to bind {}:{}", addr.0, addr.1))?
    .run()
    .await?;
    Ok(())
}
