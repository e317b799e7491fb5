pub mod cancellation;
pub mod consts;
