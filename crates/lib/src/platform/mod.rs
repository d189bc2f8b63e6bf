pub mod credentials;
pub mod os;
pub mod paths;

pub use credentials::{CredentialCache, SudoCredentials};
pub use os::Os;
pub use paths::KegPaths;
