//! Recovery of applications left in draft status.

mod resolver;
mod route;

pub use resolver::PendingApplicationResolver;
pub use route::EntryRoute;
