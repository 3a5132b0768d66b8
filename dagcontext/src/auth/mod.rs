//! Authentication token acquisition.
//!
//! This module provides:
//! - `IdentitySelector` naming the fixed set of providers
//! - The `IdentityProvider` trait and its implementations
//! - `AuthFactory` to query every provider at once

mod cli;
mod default;
mod factory;
mod provider;
mod system;

pub use cli::AzureCliIdentity;
pub use default::DefaultIdentity;
pub use factory::{AuthFactory, TokenCollection};
pub use provider::{AccessToken, IdentityProvider, IdentitySelector};
pub use system::SystemIdentity;

#[cfg(test)]
pub use provider::MockIdentityProvider;
