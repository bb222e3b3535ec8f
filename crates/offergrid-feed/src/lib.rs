pub mod client;
pub mod error;
pub mod normalize;
mod retry;
pub mod types;

pub use client::FeedClient;
pub use error::FeedError;
pub use normalize::normalize_product;
pub use types::{FeedProductsResponse, ShopifyOption, ShopifyProduct, ShopifyVariant};
