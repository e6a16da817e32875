pub mod analysis;
pub mod approval;
pub mod cart;
pub mod dashboard;
pub mod guests;
pub mod items;
pub mod requests;
pub mod users;

pub use analysis::AnalysisService;
pub use cart::CartStore;
pub use dashboard::DashboardService;
pub use guests::GuestService;
pub use items::ItemService;
pub use requests::RequestService;
pub use users::UserService;
