use dotenvy::dotenv;
use tokio_postgres::{Config, NoTls};

/// Quote a database name for use as an SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv();

    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set in environment")?;
    let target: Config = database_url.parse()?;
    let db_name = target
        .get_dbname()
        .ok_or("DATABASE_URL does not name a database")?
        .to_string();

    // Manage databases from the maintenance database on the same server
    let mut admin = target.clone();
    admin.dbname("postgres");

    println!("Connecting to the postgres maintenance database...");
    let (client, connection) = admin.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });

    let row = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])
        .await?;
    if row.is_some() {
        println!("Database '{}' already exists.", db_name);
        return Ok(());
    }

    client
        .batch_execute(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
        .await?;
    println!("Database '{}' created successfully.", db_name);

    Ok(())
}
