pub mod chain;
pub mod config;
pub mod engine;
pub mod hashlock;
pub mod swap;
pub mod units;

pub use chain::{
    Address, AssetRef, ChainClient, ChainError, ChainResult, EscrowKind, EscrowStatus,
    MismatchField, RecordArgs, SignedCall, TransactionRecord, Verification, translate_status,
    verify_transaction,
};
pub use config::{ConfigError, EscrowConfig, Network, load_config};
pub use engine::{SharedDeal, SwapEngine};
pub use hashlock::{HashlockError, HashlockResult, Secret, SecretHash, commit, is_expired, verify};
pub use swap::{Deal, DealPhase, Leg, LegSlot, LegState, SwapError, SwapResult};
pub use units::{CANONICAL_DECIMALS, UnitsError, UnitsResult, to_canonical, to_native};
