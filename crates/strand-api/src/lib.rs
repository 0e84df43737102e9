pub mod chat;
pub mod error;
pub mod middleware;
pub mod state;
pub mod threads;
pub mod users;
