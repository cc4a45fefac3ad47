//! Catalog browsing and management.

use std::path::PathBuf;

use clap::Subcommand;
use kaline_commerce::CommerceConfig;
use kaline_core::{Discount, ProductDraft, ProductPatch};
use tracing::info;

use super::{open, print_notices, print_product_row};

#[derive(Subcommand)]
pub enum ProductsAction {
    /// List products, optionally filtered
    List {
        /// Only products in this category
        #[arg(long)]
        category: Option<String>,
        /// Case-insensitive search over name and category
        #[arg(long)]
        search: Option<String>,
        /// Offered in any of these sizes
        #[arg(long = "size")]
        sizes: Vec<String>,
        /// Offered in any of these colors
        #[arg(long = "color")]
        colors: Vec<String>,
    },
    /// Show one product and related products
    Show {
        /// Product identifier (`42` also finds `prod-42`)
        id: String,
    },
    /// Add a product and sync it to the remote catalog
    Add {
        /// JSON file holding a product draft; other flags are ignored
        #[arg(long, conflicts_with = "name")]
        file: Option<PathBuf>,
        #[arg(long, required_unless_present = "file")]
        name: Option<String>,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Price, e.g. "R$ 189,90" or "189.90"
        #[arg(long, default_value = "")]
        price: String,
        /// Discount percentage
        #[arg(long)]
        discount: Option<u8>,
        /// Image URL or data URI
        #[arg(long, default_value = "")]
        image: String,
        #[arg(long = "size")]
        sizes: Vec<String>,
        #[arg(long = "color")]
        colors: Vec<String>,
        #[arg(long)]
        stock: Option<u32>,
    },
    /// Update fields of a product
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        price: Option<String>,
        /// Discount percentage
        #[arg(long, conflicts_with = "clear_discount")]
        discount: Option<u8>,
        /// Remove the current discount
        #[arg(long)]
        clear_discount: bool,
        #[arg(long)]
        image: Option<String>,
        /// Replace the offered sizes
        #[arg(long = "size")]
        sizes: Vec<String>,
        /// Replace the offered colors
        #[arg(long = "color")]
        colors: Vec<String>,
        #[arg(long)]
        stock: Option<u32>,
    },
    /// Remove a product
    Remove { id: String },
}

/// Run a products subcommand.
///
/// # Errors
///
/// Returns an error if the session cannot be opened, the draft file cannot be
/// read, or the catalog rejects the operation.
#[allow(clippy::print_stdout, clippy::too_many_lines)]
pub async fn run(
    config: &CommerceConfig,
    action: ProductsAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let commerce = open(config).await?;
    let mut events = commerce.subscribe();
    let catalog = commerce.catalog();

    match action {
        ProductsAction::List {
            category,
            search,
            sizes,
            colors,
        } => {
            let mut products = match (&category, &search) {
                (Some(category), _) => catalog.get_by_category(category),
                (None, Some(term)) => catalog.search(term),
                (None, None) => catalog.products(),
            };
            if let (Some(_), Some(term)) = (&category, &search) {
                let matching = catalog.search(term);
                products.retain(|p| matching.iter().any(|m| m.id == p.id));
            }
            if !sizes.is_empty() || !colors.is_empty() {
                let matching = catalog.filter(&sizes, &colors);
                products.retain(|p| matching.iter().any(|m| m.id == p.id));
            }

            for product in &products {
                print_product_row(product);
            }
            println!("{} product(s)", products.len());
        }
        ProductsAction::Show { id } => {
            let Some(product) = catalog.get_by_id(&id) else {
                return Err(format!("Product not found: {id}").into());
            };
            println!("{}", serde_json::to_string_pretty(&product)?);
            if !product.is_available() {
                println!("Esgotado");
            }

            let related = catalog.related(product.id.as_str(), 4);
            if !related.is_empty() {
                println!("\nRelated:");
                for product in &related {
                    print_product_row(product);
                }
            }
        }
        ProductsAction::Add {
            file,
            name,
            category,
            description,
            price,
            discount,
            image,
            sizes,
            colors,
            stock,
        } => {
            let draft = if let Some(path) = file {
                let raw = tokio::fs::read_to_string(&path).await?;
                serde_json::from_str::<ProductDraft>(&raw)?
            } else {
                ProductDraft {
                    name: name.unwrap_or_default(),
                    category,
                    description,
                    price: price.into(),
                    discount: discount.map(Discount::Percent),
                    image,
                    sizes,
                    colors,
                    stock,
                    ..ProductDraft::default()
                }
            };

            let result = catalog.add(draft).await;
            print_notices(&mut events);
            let product = result?;
            info!(product_id = %product.id, "product added");
            print_product_row(&product);
        }
        ProductsAction::Update {
            id,
            name,
            category,
            description,
            price,
            discount,
            clear_discount,
            image,
            sizes,
            colors,
            stock,
        } => {
            let patch = ProductPatch {
                name,
                category,
                description,
                price: price.map(Into::into),
                discount: if clear_discount {
                    Some(None)
                } else {
                    discount.map(|percent| Some(Discount::Percent(percent)))
                },
                image,
                sizes: (!sizes.is_empty()).then_some(sizes),
                colors: (!colors.is_empty()).then_some(colors),
                stock: stock.map(Some),
                ..ProductPatch::default()
            };
            if patch.is_empty() {
                return Err("Nothing to update; pass at least one field".into());
            }

            let result = catalog.update(&id, patch).await;
            print_notices(&mut events);
            print_product_row(&result?);
        }
        ProductsAction::Remove { id } => {
            let result = catalog.remove(&id).await;
            print_notices(&mut events);
            let outcome = result?;
            if !outcome.remote_confirmed {
                println!(
                    "{} removed locally; the remote catalog did not confirm",
                    outcome.product.id
                );
            }
        }
    }

    print_notices(&mut events);
    commerce.close();
    Ok(())
}
