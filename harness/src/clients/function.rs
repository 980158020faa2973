//! Function Execution Client
//!
//! Deployable artifacts are packaged by an external collaborator; this
//! client ships them to the emulator as opaque bytes.

use serde::{Deserialize, Serialize};

use super::factory::ClientHandle;
use crate::error::HarnessResult;

#[derive(Clone)]
pub struct FunctionClient {
    handle: ClientHandle,
}

#[derive(Serialize, Debug)]
struct CreateFunctionRequest<'a> {
    name: &'a str,
    runtime: &'a str,
    handler: &'a str,
    archive: &'a [u8],
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub runtime: String,
    pub handler: String,
    pub arn: String,
}

#[derive(Serialize, Debug)]
struct CreateMappingRequest<'a> {
    function: &'a str,
    source_arn: &'a str,
    starting_position: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSourceMapping {
    pub uuid: String,
    pub state: String,
}

#[derive(Deserialize, Debug)]
struct ListFunctionsResponse {
    functions: Vec<FunctionInfo>,
}

impl FunctionClient {
    pub fn new(handle: ClientHandle) -> Self {
        Self { handle }
    }

    /// Deploy a function from an externally packaged artifact.
    pub async fn create_function(
        &self,
        name: &str,
        runtime: &str,
        handler: &str,
        archive: &[u8],
    ) -> HarnessResult<FunctionInfo> {
        self.handle
            .post_json(
                "/functions",
                &CreateFunctionRequest {
                    name,
                    runtime,
                    handler,
                    archive,
                },
            )
            .await
    }

    pub async fn list_functions(&self) -> HarnessResult<Vec<FunctionInfo>> {
        let response: ListFunctionsResponse = self.handle.get_json("/functions").await?;
        Ok(response.functions)
    }

    /// Subscribe a function to a stream so new records trigger invocations.
    pub async fn create_event_source_mapping(
        &self,
        function: &str,
        source_arn: &str,
        starting_position: &str,
    ) -> HarnessResult<EventSourceMapping> {
        self.handle
            .post_json(
                &format!("/functions/{function}/event-source-mappings"),
                &CreateMappingRequest {
                    function,
                    source_arn,
                    starting_position,
                },
            )
            .await
    }
}
