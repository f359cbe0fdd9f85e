//! Network front ends: the HTTP and pass-through listeners, the UDP
//! integration tasks and the state they share.

pub mod broadcast;
pub mod legacy;
pub mod listener;
pub mod state;

pub use state::AppState;
