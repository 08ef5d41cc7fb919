use sqlx::postgres::{PgPool, PgPoolOptions};

/// Builds the shared connection pool and runs pending migrations, grounded
/// in `MoodEventRepository::init_schema` — this workspace only has one
/// schema owner (the store), so running migrations at startup is the whole
/// bootstrap.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
	let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
	sqlx::migrate!("./migrations").run(&pool).await?;
	Ok(pool)
}

/// Cheap connectivity check for the binary's `/healthz` endpoint.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
	sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
