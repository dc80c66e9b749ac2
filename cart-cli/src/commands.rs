use cart::{Cart, CartEngine, Product, codec};
use clap::{Parser, Subcommand};
use shared::Result;
use shared::config::EngineConfig;
use std::time::Duration;

/// Store call limit used when `CART_STORE_TIMEOUT_MS` is not set, so a hung
/// store cannot keep the process from exiting.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "cart", about = "Inspect and edit the persisted shopping cart")]
pub struct Cli {
    /// Print the cart as its stored JSON record instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the current cart
    List,
    /// Add one unit of a product (bumps the quantity if already present)
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        image_url: String,
        #[arg(long, value_parser = parse_price)]
        price: f64,
    },
    /// Raise a line's quantity by one
    Increment { id: String },
    /// Lower a line's quantity by one, removing it at zero
    Decrement { id: String },
}

fn parse_price(raw: &str) -> std::result::Result<f64, String> {
    let price: f64 = raw.trim().parse().map_err(|e| format!("{e}"))?;
    if !price.is_finite() {
        return Err(format!("price must be a finite number, got {raw}"));
    }
    Ok(price)
}

pub fn with_store_timeout(mut config: EngineConfig) -> EngineConfig {
    if config.store_timeout.is_none() {
        config.store_timeout = Some(DEFAULT_STORE_TIMEOUT);
    }
    config
}

pub async fn run(command: Command, engine: &CartEngine) -> Result<()> {
    match command {
        Command::List => Ok(()),
        Command::Add {
            id,
            title,
            image_url,
            price,
        } => {
            engine
                .add_to_cart(Product::new(id, title, image_url, price))
                .await
        }
        Command::Increment { id } => engine.increment(&id).await,
        Command::Decrement { id } => engine.decrement(&id).await,
    }
}

pub fn render(cart: &Cart, json: bool) -> Result<String> {
    if json {
        return codec::encode(cart);
    }
    Ok(render_table(cart))
}

fn render_table(cart: &Cart) -> String {
    if cart.is_empty() {
        return "Cart is empty".to_string();
    }

    let id_width = cart.iter().map(|i| i.id.len()).max().unwrap_or(0).max(2);
    let title_width = cart.iter().map(|i| i.title.len()).max().unwrap_or(0).max(5);

    let mut out = format!(
        "{:<id_width$}  {:<title_width$}  {:>10}  {:>8}\n",
        "ID", "TITLE", "PRICE", "QTY"
    );
    for item in cart {
        out.push_str(&format!(
            "{:<id_width$}  {:<title_width$}  {:>10.2}  {:>8}\n",
            item.id, item.title, item.price, item.quantity
        ));
    }
    out.push_str(&format!("{} line(s), {} unit(s)", cart.len(), cart.total_quantity()));
    out
}
