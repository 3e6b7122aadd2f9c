// External collaborators: profile directory, slip store, sanction letters
// and the natural-language completion service. The core only depends on the
// traits; the implementations here are the defaults wired up by the server.
pub mod completion;
pub mod directory;
pub mod letters;
pub mod slips;

pub use completion::{CompletionService, OpenRouterCompletion};
pub use directory::{CustomerDirectory, CustomerProfile, InMemoryDirectory};
pub use letters::{FileSanctionLetters, SanctionLetters, SanctionRequest};
pub use slips::{FsSlipStore, SlipStore};
