use anyhow::{Context, Result};
use meter_service::{
    billing::RateBook,
    config::AppConfig,
    evidence::FsEvidenceStore,
    http, metrics_server, observability,
    ocr::{DigitExtractor, Normalizer, TesseractCli},
    store, Orchestrator,
};
use std::{net::SocketAddr, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let (readings, tenants) = store::from_config(&cfg.store).await?;

    let engine = TesseractCli::from_config(&cfg.ocr);
    // A missing engine only fails recognition requests; manual entry and the
    // derived view keep working.
    match engine.probe() {
        Ok(version) => tracing::info!(%version, "OCR engine ready"),
        Err(e) => tracing::warn!(error = %e, "OCR engine not usable, recognition requests will fail"),
    }

    let orchestrator = Arc::new(Orchestrator::new(
        Normalizer::new(cfg.normalize.options()),
        DigitExtractor::new(Arc::new(engine)),
        Arc::new(FsEvidenceStore::new(&cfg.evidence.dir)),
        readings,
        tenants,
        RateBook::new(cfg.rates),
    ));

    let app = http::router(orchestrator, &cfg.evidence.dir, cfg.http.max_upload_bytes);

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .with_context(|| format!("invalid http.bind_addr {}", cfg.http.bind_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%addr, "meter service listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
