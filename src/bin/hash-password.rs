//! Prints a bcrypt hash for seeding an admin identity.

use bcrypt::{hash, DEFAULT_COST};
use std::env;

fn main() {
    let mut args = env::args().skip(1);
    let (Some(email), Some(password)) = (args.next(), args.next()) else {
        eprintln!("Usage: cargo run --bin hash-password <EMAIL> <PASSWORD>");
        std::process::exit(1);
    };

    let hashed = match hash(&password, DEFAULT_COST) {
        Ok(hashed) => hashed,
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    };

    println!("\nEmail : {}", email);
    println!("Cost  : {}", DEFAULT_COST);
    println!("Hash  : {}\n", hashed);

    println!("# In-memory development store, paste into your .env:");
    println!("ADMIN_EMAIL={}", email);
    println!("ADMIN_HASH_PASSWORD={}\n", hashed);

    println!("# Postgres, run against DATABASE_URL:");
    println!(
        "WITH u AS (INSERT INTO auth_users (email, password_hash) VALUES ('{}', '{}') RETURNING id)",
        email.replace('\'', "''"),
        hashed
    );
    println!("INSERT INTO admin_users (id, role) SELECT id, 'admin' FROM u;");
}
