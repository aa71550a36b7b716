pub mod columns;
pub mod config;
pub mod export;
pub mod notify;
pub mod query;
pub mod record;
pub mod resize;
pub mod storage;
pub mod util;
