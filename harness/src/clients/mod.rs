//! Service Clients
//!
//! SDK-style clients bound to the resolved local endpoints. The factory
//! gates construction on the environment being Ready; the typed clients are
//! thin JSON-over-HTTP bindings - the wire protocol belongs to the emulator.

pub mod factory;
pub mod function;
pub mod object_store;
pub mod queue;
pub mod stream;

// Re-export main types
pub use factory::{ClientFactory, ClientHandle};
pub use function::{EventSourceMapping, FunctionClient, FunctionInfo};
pub use object_store::{BucketInfo, ObjectBody, ObjectStoreClient};
pub use queue::{Message, QueueClient, QueueInfo, SendMessageResponse};
pub use stream::{PutRecordResponse, StreamClient, StreamDescription};
