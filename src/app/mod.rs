mod session;
mod state;

#[cfg(test)]
mod tests;

pub use session::{ClipSession, SessionCommand, SessionHandle};
pub use state::SessionState;
