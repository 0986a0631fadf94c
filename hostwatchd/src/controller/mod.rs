pub mod handle;
pub mod hash;
pub mod state;

pub use handle::ControllerHandle;
pub use state::Controller;
