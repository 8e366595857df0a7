mod bridge;
mod coordinator;
mod cycle;
mod derived;
mod fanout;
mod models;

pub use bridge::*;
pub use coordinator::*;
pub use derived::*;
pub use fanout::*;
pub use models::*;
