pub mod follow;
pub mod quiz_attempt;
pub mod session;
pub mod study_set;
pub mod user;

pub use follow::*;
pub use quiz_attempt::*;
pub use session::*;
pub use study_set::*;
pub use user::*;
