//! CLI command definitions using clap.
//!
//! Read-only commands against both APIs, plus `config` to show the effective
//! configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// podstore - rate-limited storefront and fulfillment API client
#[derive(Parser, Debug)]
#[command(name = "podstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration as YAML
    Config,

    /// List synced products at the fulfillment provider
    Products {
        /// Items to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Page size
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Show one synced product at the fulfillment provider
    Product {
        /// Product id, or @external_id
        id: String,
    },

    /// List fulfillment orders
    Orders {
        /// Filter by status (draft, pending, fulfilled, ...)
        #[arg(short, long)]
        status: Option<String>,

        /// Items to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Page size
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Show one fulfillment order
    Order {
        /// Order id, or @external_id
        id: String,
    },

    /// List products in the storefront platform
    ShopProducts {
        /// Page size
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },

    /// List orders in the storefront platform
    ShopOrders {
        /// Filter by status (open, closed, cancelled, any)
        #[arg(short, long)]
        status: Option<String>,

        /// Page size
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_products_defaults() {
        let cli = Cli::try_parse_from(["podstore", "products"]).unwrap();
        match cli.command {
            Commands::Products { offset, limit } => {
                assert_eq!(offset, 0);
                assert_eq!(limit, 20);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(!cli.is_verbose());
    }

    #[test]
    fn test_parse_orders_with_status() {
        let cli = Cli::try_parse_from(["podstore", "orders", "--status", "pending", "-l", "5"]).unwrap();
        match cli.command {
            Commands::Orders { status, limit, .. } => {
                assert_eq!(status.as_deref(), Some("pending"));
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["podstore", "shop-products", "-v", "-c", "/tmp/podstore.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/podstore.yml")));
        assert!(matches!(cli.command, Commands::ShopProducts { limit: 50 }));
    }

    #[test]
    fn test_product_requires_id() {
        assert!(Cli::try_parse_from(["podstore", "product"]).is_err());
    }
}
