pub mod bybit;
pub mod core;
pub mod mock;
pub mod observability;
pub mod telegram;

pub use bybit::BybitMarketDataService;
pub use telegram::TelegramNotifier;
