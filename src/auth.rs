//! Auth-domain identifiers, token secrets, and the session model.

pub mod claims;
pub mod id;
pub mod secret;
pub mod session;

pub use claims::*;
pub use id::*;
pub use secret::*;
pub use session::*;
