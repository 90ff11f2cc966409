use clap::{Parser, Subcommand};
use tracing::info;

use recipe_api::{app, config::AppConfig, db, state::AppState, users::services};

#[derive(Parser)]
#[command(name = "recipe-api", about = "Recipe management REST API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for the database, migrate and serve HTTP (default)
    Serve,
    /// Block until the database accepts connections
    WaitForDb,
    /// Create an administrative account
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipe_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::WaitForDb => {
            db::wait_for_db(&config.database_url, &config.db_wait).await?;
        }
        Command::CreateSuperuser { email, password } => {
            let pool = db::wait_for_db(&config.database_url, &config.db_wait).await?;
            db::run_migrations(&pool).await?;
            let state = AppState::init(config, pool).await?;
            let user = services::create_superuser(&*state.users, &email, &password)
                .await
                .map_err(|e| anyhow::anyhow!("create superuser: {e}"))?;
            info!(user_id = user.id, email = %user.email, "superuser created");
        }
        Command::Serve => {
            let pool = db::wait_for_db(&config.database_url, &config.db_wait).await?;
            db::run_migrations(&pool).await?;
            let state = AppState::init(config, pool).await?;
            app::serve(app::build_app(state)).await?;
        }
    }

    Ok(())
}
