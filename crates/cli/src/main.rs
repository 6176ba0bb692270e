use clap::{Parser, Subcommand};
use hms_core::repositories::identity::{IdentityService, NewIdentity};
use hms_core::repositories::profiles::ProfileService;
use hms_core::{core_config_from_env, CoreConfig, Database, Role};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hms")]
#[command(about = "HMS hospital portal operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an admin account
    CreateAdmin {
        /// Login name
        username: String,
        /// Initial password (at least 8 characters)
        password: String,
        /// Contact email (optional)
        #[arg(long)]
        email: Option<String>,
    },
    /// List doctors with their approval state
    ListDoctors {
        /// Only doctors still awaiting approval
        #[arg(long)]
        pending: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("hms_core=warn".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Nothing to do. Try `hms --help`.");
        return Ok(());
    };

    let cfg = Arc::new(core_config_from_env()?);
    let db = Database::connect(&cfg).await?;

    match command {
        Commands::Migrate => {
            db.migrate().await?;
            println!("Database is up to date.");
        }
        Commands::CreateAdmin {
            username,
            password,
            email,
        } => {
            db.migrate().await?;
            let created = create_admin(&db, cfg.clone(), username, password, email).await;
            if created.is_err() {
                db.close().await;
            }
            created?;
        }
        Commands::ListDoctors { pending } => {
            // listing is an admin operation; act as the first admin on file
            let admins = IdentityService::new(db.clone(), cfg.clone())
                .list_by_role(Role::Admin)
                .await?;
            let Some(admin) = admins.first() else {
                db.close().await;
                anyhow::bail!("No admin account exists. Run `hms create-admin` first.");
            };
            let profiles = ProfileService::new(db.clone(), cfg.clone());
            let doctors = if pending {
                profiles.pending_doctors(&admin.actor()).await?
            } else {
                profiles.list_doctors(&admin.actor()).await?
            };
            if doctors.is_empty() {
                println!("No doctors found.");
            } else {
                for doctor in doctors {
                    println!(
                        "ID: {}, Username: {}, Name: {} {}, Specialty: {}, Approved: {}",
                        doctor.user_id,
                        doctor.username,
                        doctor.first_name,
                        doctor.last_name,
                        doctor.specialty,
                        if doctor.is_approved { "yes" } else { "no" }
                    );
                }
            }
        }
    }

    db.close().await;
    Ok(())
}

async fn create_admin(
    db: &Database,
    cfg: Arc<CoreConfig>,
    username: String,
    password: String,
    email: Option<String>,
) -> anyhow::Result<()> {
    let new = NewIdentity {
        username,
        password,
        first_name: String::new(),
        last_name: String::new(),
        email: email.unwrap_or_default(),
        role: Role::Admin,
    };
    match IdentityService::new(db.clone(), cfg).create(new).await {
        Ok(admin) => {
            println!("Created admin {} (id {})", admin.username, admin.id);
            Ok(())
        }
        Err(e) => anyhow::bail!("Error creating admin: {}", e.user_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_admin_is_an_error() {
        let db = Database::connect_in_memory().await.unwrap();
        let cfg = Arc::new(CoreConfig::in_memory());

        create_admin(&db, cfg.clone(), "root".into(), "password123".into(), None)
            .await
            .unwrap();
        let err = create_admin(&db, cfg, "root".into(), "password123".into(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already taken"), "{err}");
    }

    #[tokio::test]
    async fn short_password_is_an_error() {
        let db = Database::connect_in_memory().await.unwrap();
        let err = create_admin(
            &db,
            Arc::new(CoreConfig::in_memory()),
            "root".into(),
            "short".into(),
            None,
        )
        .await;
        assert!(err.is_err());
    }
}
