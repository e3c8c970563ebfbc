use std::{process, sync::Arc, time::Duration};

use melo_reader::{
    application::{
        error::AppError,
        nonce::NonceService,
        reader::ReaderService,
        repos::{OptionsRepo, PostMetaRepo, PostsRepo},
        settings::TtsSettingsService,
        synthesis::{CacheStatus, SynthesisDeps, SynthesisError, SynthesisService},
        tts::TtsClient,
    },
    config,
    infra::{
        audio_store::AudioStorage,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        telemetry,
        tts::HttpTtsClient,
    },
    presentation::views::LayoutChrome,
};
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

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
        config::Command::Import(args) => run_import(settings, args).await,
        config::Command::Synthesize(args) => run_synthesize(settings, args).await,
    }
}

struct ApplicationContext {
    reader: Arc<ReaderService>,
    synthesis: Arc<SynthesisService>,
    settings: TtsSettingsService,
    tts: Arc<dyn TtsClient>,
    audio_storage: Arc<AudioStorage>,
    nonces: NonceService,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;
    serve_http(&settings, app).await
}

async fn run_import(
    settings: config::Settings,
    args: config::ImportArgs,
) -> Result<(), AppError> {
    let body = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;
    let post = app.reader.import_post(&args.title, &body).await?;

    info!(
        post_id = post.id,
        title = %post.title,
        file = %args.file.display(),
        "imported post"
    );
    println!("{}", post.id);
    Ok(())
}

async fn run_synthesize(
    settings: config::Settings,
    args: config::SynthesizeArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let outcome = app
        .synthesis
        .ensure_audio(args.post_id)
        .await
        .map_err(synthesis_error_to_app)?;

    info!(
        post_id = args.post_id,
        audio_url = %outcome.audio_url,
        cached = outcome.cache == CacheStatus::Hit,
        "post audio ready"
    );
    println!("{}", outcome.audio_url);
    Ok(())
}

fn synthesis_error_to_app(err: SynthesisError) -> AppError {
    match err {
        SynthesisError::PostNotFound { .. } => AppError::NotFound,
        SynthesisError::Repo(repo) => AppError::Repo(repo),
        SynthesisError::Text(domain) => AppError::Domain(domain),
        other => AppError::unexpected(other.to_string()),
    }
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
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let meta_repo: Arc<dyn PostMetaRepo> = repositories.clone();
    let options_repo: Arc<dyn OptionsRepo> = repositories;

    let nonces = NonceService::new(
        nonce_secret(&settings.security),
        settings.security.nonce_lifetime,
    );

    let audio_storage = Arc::new(
        AudioStorage::new(
            settings.uploads.directory.clone(),
            &settings.uploads.public_base_url,
        )
        .map_err(|err| AppError::from(InfraError::from(err)))?,
    );

    let tts: Arc<dyn TtsClient> = Arc::new(HttpTtsClient::new(
        settings.tts.request_timeout,
        settings.tts.probe_timeout,
    )?);

    let tts_settings = TtsSettingsService::new(options_repo);
    let reader = Arc::new(ReaderService::new(posts_repo.clone(), nonces.clone()));
    let synthesis = Arc::new(SynthesisService::new(
        SynthesisDeps {
            posts: posts_repo,
            meta: meta_repo,
            settings: tts_settings.clone(),
            tts: tts.clone(),
            storage: audio_storage.clone(),
            nonces: nonces.clone(),
        },
        settings.tts.max_text_chars.get(),
    ));

    Ok(ApplicationContext {
        reader,
        synthesis,
        settings: tts_settings,
        tts,
        audio_storage,
        nonces,
    })
}

fn nonce_secret(security: &config::SecuritySettings) -> String {
    match security.nonce_secret.as_ref() {
        Some(secret) => secret.clone(),
        None => {
            warn!(
                target = "melo::startup",
                "security.nonce_secret is not set; using a per-process secret, page tokens will not survive restarts"
            );
            format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
        }
    }
}

async fn serve_http(settings: &config::Settings, app: ApplicationContext) -> Result<(), AppError> {
    let chrome = LayoutChrome {
        site_title: settings.site.title.clone(),
    };

    let http_state = HttpState {
        reader: app.reader.clone(),
        synthesis: app.synthesis,
        audio_storage: app.audio_storage,
        chrome: chrome.clone(),
    };
    let admin_state = AdminState {
        settings: app.settings,
        tts: app.tts,
        reader: app.reader,
        nonces: app.nonces,
        chrome,
    };

    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let servers = async move { try_join!(public_server, admin_server).map(|_| ()) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {
            info!("shutdown signal received, draining connections");
            let _ = shutdown_tx.send(true);
        }
    }

    drain(servers, settings.server.graceful_shutdown).await
}

async fn drain<F>(servers: F, grace: Duration) -> Result<(), AppError>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match tokio::time::timeout(grace, servers).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out, dropping open connections"
            );
            Ok(())
        }
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
