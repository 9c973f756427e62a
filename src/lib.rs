// Trellis - an HTTP request dispatch engine for Rust
//
// Routes are declared with an explicit builder, matched through a static or
// parametrized route table, bound to typed handler arguments and, when
// marked synchronized, run one at a time in arrival order.

// Re-export core functionality
pub use trellis_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use trellis_config;

/// Common imports for declaring controllers, routes and dispatching requests.
pub mod prelude {
    pub use trellis_core::prelude::*;

    #[cfg(feature = "config")]
    pub use trellis_config::{ConfigManager, TrellisSettings};
}
