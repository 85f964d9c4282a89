mod state;

pub use state::PowerState;
