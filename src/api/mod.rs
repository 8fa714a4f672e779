//! External API surfaces: the Messages request builder and the raw escape hatch.

pub mod messages;
pub mod raw;
