pub mod audit;
pub mod dispatch;
pub mod error;
pub mod intake;
pub mod payment;
pub mod proof;
pub mod status;
