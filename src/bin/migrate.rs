use dotenvy::dotenv;
use glob::glob;
use std::fs;
use std::path::Path;
use tokio_postgres::NoTls;

/// `V2__add_ratings.sql` -> ("V2__add_ratings.sql", "add ratings")
fn describe(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let description = name
        .trim_end_matches(".sql")
        .split_once("__")
        .map(|(_, rest)| rest.replace('_', " "))
        .unwrap_or_else(|| name.clone());
    (name, description)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv();

    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set in environment")?;

    let (mut client, connection) = tokio_postgres::connect(&database_url, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });

    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version VARCHAR(100) PRIMARY KEY,
                description TEXT,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await?;

    let mut migrations = glob("migrations/V*.sql")?.filter_map(Result::ok).collect::<Vec<_>>();
    // Flyway-style names sort into apply order
    migrations.sort();

    if migrations.is_empty() {
        println!("No migration files found in migrations/");
        return Ok(());
    }

    let mut applied = 0;
    for path in migrations {
        let (version, description) = describe(&path);

        let already = client
            .query_opt("SELECT version FROM schema_migrations WHERE version = $1", &[&version])
            .await?;
        if already.is_some() {
            println!("Skipping already-applied migration: {}", version);
            continue;
        }

        println!("Applying migration: {}", version);
        let sql = fs::read_to_string(&path)?;

        let txn = client.transaction().await?;
        txn.batch_execute(&sql).await?;
        txn.execute(
            "INSERT INTO schema_migrations (version, description) VALUES ($1, $2)",
            &[&version, &description],
        )
        .await?;
        txn.commit().await?;
        applied += 1;
    }

    println!("Migrations complete ({} applied)", applied);
    Ok(())
}
