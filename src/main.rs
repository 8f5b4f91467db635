use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use bokad::blob::BlobStore;
use bokad::email::{DisabledMailer, Mailer, SendGridMailer};
use bokad::http::{build_router, AppState};
use bokad::service::Service;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("BOKAD_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    bokad::observability::init(metrics_port);

    let port = std::env::var("BOKAD_PORT").unwrap_or_else(|_| "8080".into());
    let bind = std::env::var("BOKAD_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("BOKAD_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let compact_threshold: u64 = std::env::var("BOKAD_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    let (mailer, email_enabled): (Arc<dyn Mailer>, bool) =
        match std::env::var("SENDGRID_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                let from_email = std::env::var("BOKAD_EMAIL_FROM").unwrap_or_default();
                if from_email.trim().is_empty() {
                    warn!("BOKAD_EMAIL_FROM missing, email delivery disabled");
                    (Arc::new(DisabledMailer), false)
                } else {
                    let from_name = std::env::var("BOKAD_EMAIL_FROM_NAME")
                        .unwrap_or_else(|_| "Konferenscentrum Väst".into());
                    (
                        Arc::new(SendGridMailer::new(key, from_email, from_name)),
                        true,
                    )
                }
            }
            _ => {
                warn!("SENDGRID_API_KEY missing, email delivery disabled");
                (Arc::new(DisabledMailer), false)
            }
        };

    let wal_path = PathBuf::from(&data_dir).join("bokad.wal");
    let service = Arc::new(Service::new(wal_path, mailer)?);

    let compactor_service = service.clone();
    tokio::spawn(async move {
        bokad::compactor::run_compactor(compactor_service, compact_threshold).await;
    });

    let blobs = Arc::new(BlobStore::new(PathBuf::from(&data_dir).join("blobs"))?);
    let app = build_router(AppState { service, blobs });

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("bokad listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  email: {}", if email_enabled { "enabled" } else { "disabled" });
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight requests
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        info!("shutdown signal received, draining requests");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("bokad stopped");
    Ok(())
}
