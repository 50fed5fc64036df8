pub mod error;
pub mod redis;
pub mod setup;

pub use error::TestError;
pub use redis::RedisTest;
pub use setup::TestSetup;

pub mod prelude {
    pub use crate::{RedisTest, TestError, TestSetup};
}
