//! Favorites commands.

use clap::Subcommand;
use kaline_commerce::CommerceConfig;
use kaline_core::ProductId;

use super::{open, print_notices, print_product_row};

#[derive(Subcommand)]
pub enum FavoritesAction {
    /// Favorite a product, or unfavorite it if it already is
    Toggle { id: String },
    /// List favorited products still in the catalog
    List,
}

/// Run a favorites subcommand.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the product is not in
/// the catalog.
#[allow(clippy::print_stdout)]
pub async fn run(
    config: &CommerceConfig,
    action: FavoritesAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let commerce = open(config).await?;
    let mut events = commerce.subscribe();

    match action {
        FavoritesAction::Toggle { id } => {
            // Favorites hold canonical identifiers
            let Some(product) = commerce.catalog().get_by_id(&id) else {
                return Err(format!("Product not found: {id}").into());
            };
            let id: ProductId = product.id;
            commerce.favorites().toggle(&id);
        }
        FavoritesAction::List => {
            let products = commerce.favorite_products();
            for product in &products {
                print_product_row(product);
            }
            println!("{} favorite(s)", products.len());
        }
    }

    print_notices(&mut events);
    commerce.close();
    Ok(())
}
