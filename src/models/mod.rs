// Data models for the marketplace, scheduling and workout domains

pub mod calendar;
pub mod finance;
pub mod notification;
pub mod profile;
pub mod quote;
pub mod review;
pub mod scheduling;
pub mod store;
pub mod suggestion;
pub mod user;
pub mod workout;

pub use calendar::*;
pub use finance::*;
pub use notification::*;
pub use profile::*;
pub use quote::*;
pub use review::*;
pub use scheduling::*;
pub use store::*;
pub use suggestion::*;
pub use user::*;
pub use workout::*;
