// Business logic services

pub mod calendar_service;
pub mod finance_service;
pub mod notification_service;
pub mod profile_service;
pub mod quote_service;
pub mod review_service;
pub mod scheduling_service;
pub mod store_service;
pub mod suggestion_service;
pub mod user_service;
pub mod workout_service;

pub use calendar_service::CalendarService;
pub use finance_service::FinanceService;
pub use notification_service::NotificationService;
pub use profile_service::ProfileService;
pub use quote_service::QuoteService;
pub use review_service::ReviewService;
pub use scheduling_service::SchedulingService;
pub use store_service::StoreService;
pub use suggestion_service::SuggestionService;
pub use user_service::UserService;
pub use workout_service::WorkoutService;
