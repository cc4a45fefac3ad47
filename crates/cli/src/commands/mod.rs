//! CLI command implementations.

pub mod cart;
pub mod favorites;
pub mod products;
pub mod seed;

use kaline_commerce::{Commerce, CommerceConfig, StoreEvent, drain};
use kaline_core::{Notification, NoticeLevel, Product};
use tokio::sync::broadcast;

/// Open the configured session.
pub async fn open(config: &CommerceConfig) -> Result<Commerce, Box<dyn std::error::Error>> {
    Ok(Commerce::open(config).await?)
}

/// Print every notification still queued on `events`.
pub fn print_notices(events: &mut broadcast::Receiver<StoreEvent>) {
    for event in drain(events) {
        if let StoreEvent::Notice(notice) = event {
            print_notice(&notice);
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_notice(notice: &Notification) {
    let marker = match notice.level {
        NoticeLevel::Info => "i",
        NoticeLevel::Success => "+",
        NoticeLevel::Error => "!",
    };
    println!("[{marker}] {}: {}", notice.title, notice.message);
}

/// One-line product listing.
#[allow(clippy::print_stdout)]
pub fn print_product_row(product: &Product) {
    let effective = product.effective_price();
    let price = if effective == product.price {
        product.price.to_string()
    } else {
        format!("{effective} (de {})", product.price)
    };
    println!(
        "{:<14} {:<32} {:<14} {}",
        product.id.as_str(),
        product.name,
        product.category,
        price
    );
}
