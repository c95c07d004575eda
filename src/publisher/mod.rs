pub mod resolver;
pub mod sync;

pub use resolver::{NameMatcher, PublisherResolver, SubstringMatcher};
pub use sync::PublisherSyncService;
