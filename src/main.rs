use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use tokio::{net::TcpListener, signal, sync::watch, time::timeout};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        groups::{CreateGroupCommand, GroupService},
        media::MediaStore,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo, PostsWriteRepo,
            SessionsRepo, UsersRepo,
        },
    },
    config,
    infra::{
        cache::PageCache,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState, SessionCookieConfig},
        telemetry,
        uploads::UploadStorage,
    },
};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

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
        config::Command::Groups(args) => match args.command {
            config::GroupsCommand::Create(create) => run_create_group(settings, create).await,
        },
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::migration(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn run_create_group(
    settings: config::Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let service = GroupService::new(groups_repo);

    let group = service
        .create_group(CreateGroupCommand {
            title: args.title,
            slug: args.slug,
            description: args.description,
        })
        .await?;

    info!(
        target = "yatube::groups",
        id = group.id,
        slug = %group.slug,
        "group created"
    );
    println!("{}", group.slug);
    Ok(())
}

struct ApplicationContext {
    http_state: HttpState,
    accounts: Arc<AccountService>,
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone()).map_err(InfraError::from)?,
    );
    let media_store: Arc<dyn MediaStore> = upload_storage.clone();

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo.clone(),
        follows_repo.clone(),
        comments_repo.clone(),
        settings.pagination.page_size.get(),
    ));
    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo,
        groups_repo,
        comments_repo,
        media_store,
    ));
    let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo));
    let accounts = Arc::new(AccountService::new(
        users_repo,
        sessions_repo,
        settings.session.ttl,
    ));

    let page_cache = (settings.cache.enabled && !settings.cache.index_ttl.is_zero())
        .then(|| PageCache::new(settings.cache.index_ttl));

    let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;

    let http_state = HttpState {
        feed,
        posts,
        follows,
        accounts: accounts.clone(),
        health: health_repo,
        uploads: upload_storage,
        page_cache,
        session_cookie: SessionCookieConfig {
            name: settings.session.cookie_name.clone(),
            ttl: settings.session.ttl,
        },
        max_request_bytes,
    };

    Ok(ApplicationContext {
        http_state,
        accounts,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let purge_handle = spawn_session_purge(app.accounts.clone());
    let result = serve_http(&settings, app.http_state).await;

    purge_handle.abort();
    let _ = purge_handle.await;

    result
}

fn spawn_session_purge(accounts: Arc<AccountService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match accounts.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => {
                    info!(target = "yatube::auth", removed, "purged expired sessions");
                }
                Err(err) => {
                    warn!(target = "yatube::auth", error = %err, "session purge failed");
                }
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "yatube::server",
        addr = %settings.server.addr,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .into_future(),
    );

    tokio::select! {
        joined = &mut server => {
            return joined
                .map_err(|err| AppError::from(InfraError::Server(err.to_string())))?
                .map_err(|err| AppError::from(InfraError::Server(err.to_string())));
        }
        () = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
        }
    }

    match timeout(grace, &mut server).await {
        Ok(joined) => joined
            .map_err(|err| AppError::from(InfraError::Server(err.to_string())))?
            .map_err(|err| AppError::from(InfraError::Server(err.to_string()))),
        Err(_) => {
            warn!(
                target = "yatube::server",
                seconds = grace.as_secs(),
                "graceful shutdown timed out"
            );
            server.abort();
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(target = "yatube::server", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "yatube::server", "shutdown requested");
}
