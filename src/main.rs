use std::sync::Arc;

use bookmarks::{api, config::Config, database, logger, mail, ui};
use clap::Parser;
use tracing::{info, warn};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(err) => {
                warn!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down");
}

#[tokio::main]
async fn main() -> bookmarks::Result<()> {
    let config = Config::parse();
    logger::init(config.verbose);

    let mailer : Box<dyn mail::Mailer> = match &config.mail_spool {
        Some(dir) => Box::new(mail::SpoolMailer {
            dir :  dir.clone(),
            from : config.mail_from.clone(),
        }),
        None => Box::new(mail::LogMailer),
    };

    let server = Arc::new(api::ServerInner {
        server_name :  config.server_name.clone(),
        site_url :     config.site_url().to_string(),
        token_secret : config.token_secret.clone().into_bytes(),
        db :           database::Db::new(&config.db)?,
        render :       ui::Renderer::new()?,
        mailer,
    });

    let (addr, serve) = warp::serve(api::routes(&server))
        .try_bind_with_graceful_shutdown(config.addr, shutdown_signal())?;

    info!(%addr, db = %config.db.display(), "listening");
    serve.await;

    Ok(())
}
