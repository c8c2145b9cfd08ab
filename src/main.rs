use std::{process, sync::Arc};

use snippetbox::{
    application::{
        clock::SystemClock,
        error::AppError,
        snippets::{CreateSnippetCommand, SnippetError, SnippetService},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
    presentation::{
        dispatch::RenderDispatcher,
        templates::{TemplateLayout, compile},
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Create(args) => run_create(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    // Templates are compiled before anything else so a broken tree never binds a port.
    let layout = TemplateLayout::new(&settings.templates.directory);
    let templates = compile(&layout)?;
    let renderer = RenderDispatcher::new(Arc::new(templates), settings.templates.flush_threshold);
    renderer.ensure_pages(&http::PAGES)?;
    info!(
        target = "snippetbox::templates",
        pages = ?renderer.templates().page_names(),
        flush_threshold = renderer.flush_threshold(),
        "renderer ready"
    );

    let repositories = init_repositories(&settings).await?;
    let snippets = Arc::new(SnippetService::new(
        repositories.clone(),
        Arc::new(SystemClock),
    ));

    let state = HttpState {
        snippets,
        renderer,
        db: repositories,
    };

    serve_http(&settings, state).await
}

async fn run_create(settings: config::Settings, args: config::CreateArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let service = SnippetService::new(repositories, Arc::new(SystemClock));

    let command = CreateSnippetCommand {
        title: args.title,
        content: args.content,
        expires_days: args.expires_days,
    };

    let id = service.create(command).await.map_err(|err| match err {
        SnippetError::Validation(validator) => AppError::validation(validator.to_string()),
        other => AppError::unexpected(other.to_string()),
    })?;

    info!(target = "snippetbox::cli", id, "snippet created");
    println!("{id}");
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "snippetbox::http",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "snippetbox::http", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "snippetbox::http", "shutdown signal received");
}
