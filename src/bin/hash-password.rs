//! Hashes a password with bcrypt and prints SQL that seeds an admin account.
//!
//! Usage: hash-password <PASSWORD> [USERNAME] [EMAIL]

use bcrypt::hash;
use std::env;

fn main() {
    let mut args = env::args().skip(1);
    let password = args.next().unwrap_or_else(|| {
        eprintln!("Usage: cargo run --bin hash-password <PASSWORD> [USERNAME] [EMAIL]");
        std::process::exit(1);
    });
    let username = args.next().unwrap_or_else(|| "admin".to_string());
    let email = args
        .next()
        .unwrap_or_else(|| format!("{}@furry-gallery.local", username));

    let cost: u32 = env::var("BCRYPT_COST")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(10);

    match hash(&password, cost) {
        Ok(hashed) => {
            println!("\nCost     : {}", cost);
            println!("Hash     : {}\n", hashed);
            println!("-- Seed an administrator:");
            println!(
                "INSERT INTO users (username, email, password_hash, role, active) \
                 VALUES ('{}', '{}', '{}', 'admin', true);",
                username.replace('\'', "''"),
                email.replace('\'', "''"),
                hashed
            );
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
