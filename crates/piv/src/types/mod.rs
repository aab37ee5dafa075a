mod certificate;
mod signature;
mod slot;
mod version;

pub use certificate::Certificate;
pub use signature::{Signature, SignatureAlgorithm};
pub use slot::Slot;
pub use version::Version;
