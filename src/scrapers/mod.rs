pub mod browser;
pub mod client;
pub mod details;
pub mod markup;
pub mod onthehouse;
pub mod pacing;
pub mod pagination;
pub mod parser;
pub mod traits;
pub mod types;

pub use browser::ChromeLauncher;
pub use onthehouse::OnTheHouseApi;
