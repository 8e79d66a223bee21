pub mod actor;
pub mod courier;
pub mod drop_point;
pub mod event;
pub mod order;
pub mod status;
