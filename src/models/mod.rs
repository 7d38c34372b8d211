mod activity;
mod banlist;
mod hwid_request;
mod license;
mod settings;

pub use activity::*;
pub use banlist::*;
pub use hwid_request::*;
pub use license::*;
pub use settings::*;
