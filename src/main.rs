//! Nonprofit CMS - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = nonprofit_cms::run().await {
        eprintln!("FATAL: {}", e);
        std::process::exit(1);
    }
}
