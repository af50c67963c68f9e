use std::{future, process, sync::Arc};

use catalog::{
    application::{error::AppError, populate::Populator, users::UserService},
    config,
    infra::{cache_store, db::PostgresRepositories, error::InfraError, http, telemetry},
};
use tokio::{net::TcpListener, signal, sync::oneshot};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Populate(args) => run_populate(settings, args).await,
        config::Command::UserAdd(args) => run_user_add(settings, args).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::unexpected(
            "database url is not configured (set CATALOG__DATABASE__URL or --database-url)",
        )
    })?;

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(format!("failed to run migrations: {err}")))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = cache_store::connect_or_degrade(&settings.cache).await;

    let state = http::ApiState::new(
        repositories.clone(),
        repositories.clone(),
        repositories,
        cache,
    );
    let router = http::build_router(state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "catalog::server",
        addr = %settings.server.addr,
        "listening"
    );

    let (stopping_tx, stopping_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(());
    });

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        match stopping_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            Err(_) => future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = deadline => {
            warn!(
                target = "catalog::server",
                grace_ms = grace.as_millis() as u64,
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "catalog::server", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(
            target = "catalog::server",
            error = %err,
            "failed to listen for shutdown signal"
        );
        future::pending::<()>().await;
    }
    info!(target = "catalog::server", "shutdown requested");
}

async fn run_populate(
    settings: config::Settings,
    args: config::PopulateArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = cache_store::connect(&settings.cache).await?;
    let populator = Populator::new(repositories.clone(), repositories, cache);

    if args.skip_db {
        info!(target = "catalog::populate", "skipping database seed");
    } else {
        let report = populator.seed(args.workers, args.amount).await?;
        if report.products_failed > 0 {
            warn!(
                target = "catalog::populate",
                failed = report.products_failed,
                "some seed products were not created"
            );
        }
    }

    let report = populator
        .fill_cache(args.workers, settings.cache.stream_buffer)
        .await;
    if report.stream_errors > 0 || report.cache_failures > 0 {
        warn!(
            target = "catalog::populate",
            stream_errors = report.stream_errors,
            cache_failures = report.cache_failures,
            "cache population incomplete"
        );
    }

    Ok(())
}

async fn run_user_add(
    settings: config::Settings,
    args: config::UserAddArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let users = UserService::new(repositories);
    let record = users.add_user(&args.username, &args.password).await?;

    info!(
        target = "catalog::users",
        id = record.id,
        username = %record.username,
        "user created"
    );
    Ok(())
}
