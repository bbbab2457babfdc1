// Domain models

pub mod attendance;
pub mod calendar_session;
pub mod personal_record;
pub mod sensor;
pub mod snapshot;
pub mod workout;

pub use attendance::*;
pub use calendar_session::*;
pub use personal_record::*;
pub use sensor::*;
pub use snapshot::*;
pub use workout::*;
