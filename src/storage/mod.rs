// Storage layer: local staging directory plus the remote file store

pub mod drive;
pub mod local;
pub mod remote;

pub use drive::DriveClient;
pub use local::LocalStorage;
pub use remote::{RemoteError, RemoteResult, RemoteStore, RemoteUpload};
