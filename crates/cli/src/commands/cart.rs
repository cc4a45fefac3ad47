//! Shopping cart commands.

use clap::{Args, Subcommand};
use kaline_commerce::{CheckoutSummary, CommerceConfig};
use kaline_core::{CartKey, ProductId};

use super::{open, print_notices};

/// Identifies a cart line.
#[derive(Args)]
pub struct LineArgs {
    /// Product identifier
    id: String,
    #[arg(long, default_value = "")]
    size: String,
    #[arg(long, default_value = "")]
    color: String,
}

impl LineArgs {
    fn key(&self) -> CartKey {
        CartKey::new(self.id.as_str(), self.size.as_str(), self.color.as_str())
    }
}

#[derive(Subcommand)]
pub enum CartAction {
    /// Add a product variant to the cart
    Add {
        #[command(flatten)]
        line: LineArgs,
        #[arg(long, short, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line; zero or less removes it
    Set {
        #[command(flatten)]
        line: LineArgs,
        #[arg(long, short, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        #[command(flatten)]
        line: LineArgs,
    },
    /// Show the cart and its totals
    Show,
    /// Check out and empty the cart
    Checkout,
}

/// Run a cart subcommand.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the cart rejects the
/// operation.
#[allow(clippy::print_stdout)]
pub async fn run(config: &CommerceConfig, action: CartAction) -> Result<(), Box<dyn std::error::Error>> {
    let commerce = open(config).await?;
    let mut events = commerce.subscribe();
    let cart = commerce.cart();

    match action {
        CartAction::Add { line, quantity } => {
            let result = cart.add_item(&ProductId::new(line.id), &line.size, &line.color, quantity);
            print_notices(&mut events);
            let line = result?;
            println!("{} x{}", line.key, line.quantity);
        }
        CartAction::Set { line, quantity } => {
            let result = cart.set_quantity(&line.key(), quantity);
            print_notices(&mut events);
            match result? {
                Some(line) => println!("{} x{}", line.key, line.quantity),
                None => println!("{} removed", line.key()),
            }
        }
        CartAction::Remove { line } => {
            if !cart.remove_item(&line.key()) {
                return Err(format!("Not in cart: {}", line.key()).into());
            }
            print_notices(&mut events);
        }
        CartAction::Show => {
            for line in cart.lines() {
                println!(
                    "{:<24} {:>3} x {:<12} {}",
                    line.key.to_string(),
                    line.quantity,
                    line.snapshot.price.to_string(),
                    line.line_total()
                );
            }
            print_summary(&commerce.summary());
        }
        CartAction::Checkout => {
            let result = commerce.checkout();
            print_notices(&mut events);
            print_summary(&result?);
        }
    }

    print_notices(&mut events);
    commerce.close();
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_summary(summary: &CheckoutSummary) {
    println!("Itens:    {}", summary.item_count);
    println!("Subtotal: {}", summary.subtotal);
    println!("Frete:    {}", summary.shipping);
    println!("Total:    {}", summary.total);
}
