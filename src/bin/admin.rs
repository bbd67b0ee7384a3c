//! Operational CLI for account administration: create an admin account,
//! promote an existing user, or reset a password.

use chrono::Utc;
use clap::{Parser, Subcommand};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use storefront_api::{
    auth::hash_password,
    config, db,
    entities::user::{self, Entity as UserEntity},
};

#[derive(Parser)]
#[command(name = "storefront-admin", about = "Storefront account administration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Promote an existing user to administrator
    Promote {
        #[arg(long)]
        email: String,
    },
    /// Reset a user's password
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;

    match cli.command {
        Command::CreateAdmin {
            email,
            password,
            name,
        } => {
            let existing = UserEntity::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .one(&pool)
                .await?;
            if existing.is_some() {
                return Err(format!("A user with email {} already exists", email).into());
            }

            let model = user::ActiveModel {
                id: Set(Uuid::new_v4()),
                email: Set(email.clone()),
                password_hash: Set(Some(hash_password(&password)?)),
                full_name: Set(name),
                phone: Set(None),
                role: Set(user::ROLE_ADMIN.to_string()),
                is_active: Set(true),
                created_at: Set(Utc::now()),
            };
            let created = model.insert(&pool).await?;
            println!("Created admin {} ({})", created.email, created.id);
        }
        Command::Promote { email } => {
            let found = UserEntity::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .one(&pool)
                .await?
                .ok_or_else(|| format!("No user with email {}", email))?;

            let mut active: user::ActiveModel = found.into();
            active.role = Set(user::ROLE_ADMIN.to_string());
            let updated = active.update(&pool).await?;
            println!("Promoted {} to admin", updated.email);
        }
        Command::ResetPassword { email, password } => {
            let found = UserEntity::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .one(&pool)
                .await?
                .ok_or_else(|| format!("No user with email {}", email))?;

            let mut active: user::ActiveModel = found.into();
            active.password_hash = Set(Some(hash_password(&password)?));
            let updated = active.update(&pool).await?;
            println!("Password reset for {}", updated.email);
        }
    }

    Ok(())
}
