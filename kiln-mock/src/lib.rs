pub mod guard;
pub mod registry;
pub mod stub;

pub use guard::{patch_mock_desc, use_mock, with_mock, MockGuard};
pub use registry::{MockDefinition, MockOutcome, MockRegistry, MockSelector};
pub use stub::{to_request_fn, BaseMock, JsonDataMock, RawDataMock, RawFileMock};
