pub mod admission;
pub mod elapsed;
pub mod headers;
pub mod logging;
pub mod mock;
pub mod path_tokens;
pub mod pool;
pub mod query_params;
pub mod rate_limit;
pub mod timeout;
pub mod tracking_token;

pub use admission::Admission;
pub use elapsed::ElapsedPlugin;
pub use headers::HeadersPlugin;
pub use logging::{InnerLoggerPlugin, LoggerCore, OuterLoggerPlugin};
pub use mock::{MockFactory, MockPlugin};
pub use path_tokens::PathTokensPlugin;
pub use pool::PoolPlugin;
pub use query_params::QueryParamsPlugin;
pub use rate_limit::RateLimitPlugin;
pub use timeout::TimeoutPlugin;
pub use tracking_token::TrackingTokenPlugin;
