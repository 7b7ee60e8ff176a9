pub mod checkpoint;
pub mod credentials;
pub mod error;
pub mod mail;
pub mod sanitize;
pub mod storage;
pub mod sync;

pub use checkpoint::CheckpointStore;
pub use credentials::{fetch_credential, Credential, CredentialError};
pub use error::{CheckpointError, ProtondropError, Result, StorageError};
pub use mail::{
    select_code_source, Attachment, CodeSource, ExtensionFilter, ImapSession, MailError,
    MailSession, MessageRef, ServerConfig,
};
pub use storage::FileWriter;
pub use sync::{SyncEngine, SyncOptions, SyncReport};
