//! External service integrations.

pub mod metrics_provider {
    pub use crate::metrics_provider::*;
}

pub mod render_client {
    pub use crate::render_client::*;
}

pub mod auth {
    pub use crate::auth::*;
}
