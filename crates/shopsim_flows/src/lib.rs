//! Instrumented storefront workflows.
//!
//! Each workflow opens one transaction, stamps the session context,
//! drives the simulator through timed child spans and closes the root
//! with a categorized outcome. Workflows share nothing but the simulator
//! and the collector.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopsim_flows::{cart, checkout, Cart, FlowContext};
//!
//! let ctx = FlowContext::for_session(collector, simulator, session);
//! let mut cart = Cart::new();
//! cart::add_item(&ctx, &mut cart, "sku-1001", 1).await?;
//! let done = checkout::checkout(&ctx, &cart).await?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod context;
pub mod error;
pub mod search;
pub mod step;

pub use cart::{Cart, CartLine};
pub use catalog::{Product, ProductPage};
pub use checkout::{Checkout, Receipt};
pub use context::{FlowContext, TokioClock};
pub use error::{FlowError, Result};
pub use search::SearchResults;
