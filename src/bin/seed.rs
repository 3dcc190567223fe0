use dotenvy::dotenv;
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

const CATEGORIES: [(&str, &str); 4] = [
    ("Crop residues", "Straw, stalks, husks and other field leftovers"),
    ("Food processing by-products", "Peels, pulp, pomace and spent grains"),
    ("Animal by-products", "Manure and bedding from livestock farms"),
    ("Wood and forestry", "Prunings, sawdust and bark"),
];

// (name, category, unit, hazardous)
const MATERIALS: [(&str, &str, &str, bool); 8] = [
    ("Wheat straw", "Crop residues", "tonnes", false),
    ("Rice husk", "Crop residues", "tonnes", false),
    ("Corn stover", "Crop residues", "tonnes", false),
    ("Olive pomace", "Food processing by-products", "tonnes", false),
    ("Brewers spent grain", "Food processing by-products", "tonnes", false),
    ("Citrus peel", "Food processing by-products", "kg", false),
    ("Cattle manure", "Animal by-products", "m3", true),
    ("Vineyard prunings", "Wood and forestry", "tonnes", false),
];

// (email, username, role, full name, company, location)
const USERS: [(&str, &str, &str, &str, &str, &str); 5] = [
    ("admin@agriloop.test", "admin", "admin", "Platform Admin", "AgriLoop", "Lisbon"),
    ("farm@agriloop.test", "green_acres", "producer", "Ana Costa", "Green Acres Farm", "Evora"),
    ("mill@agriloop.test", "olive_mill", "producer", "Rui Martins", "Alentejo Olive Mill", "Beja"),
    ("buyer@agriloop.test", "biogas_co", "buyer", "Marta Silva", "BioGas Energia", "Setubal"),
    ("haul@agriloop.test", "fast_haul", "transporter", "Joao Pereira", "Fast Haul Logistics", "Lisbon"),
];

// (seller username, material, title, quantity, price per unit, location)
const LISTINGS: [(&str, &str, &str, f64, f64, &str); 10] = [
    ("green_acres", "Wheat straw", "Baled wheat straw, dry", 40.0, 55.0, "Evora"),
    ("green_acres", "Corn stover", "Corn stover after harvest", 25.0, 40.0, "Evora"),
    ("green_acres", "Rice husk", "Rice husk for bedding or fuel", 12.5, 70.0, "Evora"),
    ("green_acres", "Cattle manure", "Aged cattle manure", 80.0, 8.0, "Evora"),
    ("green_acres", "Vineyard prunings", "Chipped vineyard prunings", 15.0, 35.0, "Evora"),
    ("olive_mill", "Olive pomace", "Fresh olive pomace", 120.0, 18.0, "Beja"),
    ("olive_mill", "Olive pomace", "Dried olive pomace pellets", 30.0, 95.0, "Beja"),
    ("olive_mill", "Brewers spent grain", "Spent grain from partner brewery", 20.0, 22.0, "Beja"),
    ("olive_mill", "Citrus peel", "Orange peel, weekly batches", 5000.0, 0.05, "Beja"),
    ("olive_mill", "Wheat straw", "Small square straw bales", 10.0, 60.0, "Beja"),
];

/// Random demo password that still satisfies the account password policy
fn random_password() -> Result<String, String> {
    let mut buf = [0u8; 9];
    getrandom::getrandom(&mut buf).map_err(|e| format!("OS RNG failure: {}", e))?;
    let body: String = buf.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(format!("Ag{}1", body))
}

async fn id_by(client: &Client, sql: &str, key: &str) -> Result<Uuid, Box<dyn std::error::Error>> {
    let row = client.query_one(sql, &[&key]).await?;
    Ok(row.get(0))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv();

    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set in environment")?;
    let (password, generated) = match std::env::var("SEED_PASSWORD") {
        Ok(password) => (password, false),
        Err(_) => (random_password()?, true),
    };
    let cost = std::env::var("BCRYPT_COST")
        .ok()
        .and_then(|c| c.parse().ok())
        .unwrap_or(bcrypt::DEFAULT_COST);

    let (client, connection) = tokio_postgres::connect(&database_url, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });

    client
        .batch_execute(agriloop_server::database::INITIAL_SCHEMA)
        .await?;

    for (name, description) in CATEGORIES {
        client
            .execute(
                "INSERT INTO material_categories (name, description) VALUES ($1, $2)
                 ON CONFLICT (name) DO NOTHING",
                &[&name, &description],
            )
            .await?;
    }
    println!("Categories: {}", CATEGORIES.len());

    for (name, category, unit, hazardous) in MATERIALS {
        let category_id = id_by(&client, "SELECT id FROM material_categories WHERE name = $1", category).await?;
        client
            .execute(
                "INSERT INTO materials (category_id, name, default_unit, is_hazardous) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (name) DO NOTHING",
                &[&category_id, &name, &unit, &hazardous],
            )
            .await?;
    }
    println!("Materials: {}", MATERIALS.len());

    let password_hash = bcrypt::hash(&password, cost)?;
    let mut created_users = 0;
    for (email, username, role, full_name, company, location) in USERS {
        created_users += client
            .execute(
                "INSERT INTO users (email, username, password_hash, role, full_name, company_name, location, is_email_verified)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, true)
                 ON CONFLICT DO NOTHING",
                &[&email, &username, &password_hash, &role, &full_name, &company, &location],
            )
            .await?;
    }
    println!("Users: {} new of {}", created_users, USERS.len());

    let existing: i64 = client
        .query_one("SELECT COUNT(*) FROM material_listings", &[])
        .await?
        .get(0);
    if existing > 0 {
        println!("Listings already present ({}), skipping", existing);
    } else {
        seed_listings(&client).await?;
        println!("Listings: {}", LISTINGS.len());
    }

    if generated && created_users > 0 {
        println!("Seed complete. Demo account password: {}", password);
    } else {
        println!("Seed complete.");
    }
    Ok(())
}

async fn seed_listings(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    for (seller, material, title, quantity, price, location) in LISTINGS {
        let seller_id = id_by(client, "SELECT id FROM users WHERE username = $1", seller).await?;
        let material_row = client
            .query_one("SELECT id, default_unit FROM materials WHERE name = $1", &[&material])
            .await?;
        let material_id: Uuid = material_row.get(0);
        let unit: String = material_row.get(1);

        client
            .execute(
                "INSERT INTO material_listings
                    (seller_id, material_id, title, quantity_total, quantity_available, unit, price_per_unit, location)
                 VALUES ($1, $2, $3, $4, $4, $5, $6, $7)",
                &[&seller_id, &material_id, &title, &quantity, &unit, &price, &location],
            )
            .await?;
    }
    Ok(())
}
