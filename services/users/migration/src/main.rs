use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(userhub_users_migration::Migrator).await;
}
