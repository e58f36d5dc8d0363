//! Remote tier implementations.

mod redis;

pub use self::redis::{RedisTier, DEFAULT_REDIS_TIMEOUT};
