pub mod initiation;
pub mod settlement;
pub mod verification;

pub use initiation::{DepositRequest, InitiatedTransaction, InitiationService, TransferRequest};
pub use settlement::SettlementService;
pub use verification::{TrustSource, VerificationOutcome, VerificationService};
