// Route handlers. Authorization happens before these run (route layers) or,
// for role-dispatched routes, as the first step inside the handler.
pub mod catalog;
pub mod health;
pub mod learners;
pub mod progress;
pub mod session;
