//! Furry Gallery Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = furry_gallery_backend::run().await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
