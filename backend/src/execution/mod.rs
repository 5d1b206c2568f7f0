pub mod executor;
pub mod signer;
pub mod submitter;

pub use executor::{ChainExecutionSettings, ExecutionFailure, SigningAccount, SwapExecutor};
pub use signer::{LocalSigner, SignedTransaction, TransactionSigner, UnsignedTransaction};
pub use submitter::{ChainSubmitter, ConfirmationStatus, RpcChainSubmitter};
