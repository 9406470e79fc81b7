pub mod reporter;
pub mod transport;

pub use reporter::Reporter;
pub use transport::Transport;
