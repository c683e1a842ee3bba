//! Price and gas-price oracles feeding the fee policy.

pub mod gas_price;
pub mod price;

pub use gas_price::{
    GasPriceConfig, GasPriceOracle, GasPriceQueryError, GasPriceSource, GasPriceStrategy,
    ProviderGasPriceSource, UnconfiguredNetwork,
};
pub use price::{PriceFeed, PriceFeedError, PriceLookup, PriceOracle, StaticPriceFeed};
