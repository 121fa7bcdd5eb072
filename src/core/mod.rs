// Domain-layer modules and shared errors/models
pub mod score {
    pub use crate::score::*;
}

pub mod tags {
    pub use crate::tags::*;
}

pub mod display {
    pub use crate::display::*;
}

pub mod leaderboard {
    pub use crate::leaderboard::*;
}

pub mod capture {
    pub use crate::capture::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
