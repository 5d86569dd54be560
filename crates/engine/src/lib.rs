pub mod artifact;
pub mod assets;
pub mod attempt;
pub mod conversation;
pub mod library;
pub mod prompt;
pub mod response;

pub use artifact::*;
pub use assets::*;
pub use attempt::*;
pub use conversation::*;
pub use library::*;
pub use prompt::*;
pub use response::*;
