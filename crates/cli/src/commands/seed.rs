//! Seed the local catalog.
//!
//! Opening a session seeds the catalog from `KALINE_SEED_PATH` (or the
//! bundled feed) only when no catalog has been stored yet. With `--reset`
//! the stored catalog is dropped through the catalog store and the session
//! is reopened, so the feed is ingested again. The cart and favorites are
//! kept.

use kaline_commerce::CommerceConfig;
use tracing::info;

use super::open;

/// Seed the catalog.
///
/// # Errors
///
/// Returns an error if the stored catalog cannot be removed or the seed feed
/// cannot be read.
#[allow(clippy::print_stdout)]
pub async fn run(config: &CommerceConfig, reset: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut commerce = open(config).await?;
    if reset {
        let dropped = commerce.catalog().reset()?;
        info!(dropped, "stored catalog discarded");
        commerce.close();
        commerce = open(config).await?;
    }

    let catalog = commerce.catalog();
    let placeholders = catalog
        .products()
        .iter()
        .filter(|p| p.image.is_placeholder())
        .count();

    println!("{} product(s) in catalog", catalog.len());
    if placeholders > 0 {
        println!("{placeholders} image(s) could not be fetched and use the placeholder");
    }

    commerce.close();
    Ok(())
}
