//! Database API sub-client — chain state reads.

use serde_json::json;

use crate::api::wire::{Account, Block, DynamicGlobalProperties};
use crate::api::{Api, ApiContext};
use crate::error::RpcError;
use crate::rpc::{JsonMapper, PayloadMapper, RpcClient, RpcRequest, Transport};

/// Sub-client for the `database` API.
pub struct DatabaseApi<'a, T: Transport, M: PayloadMapper = JsonMapper> {
    rpc: &'a RpcClient<T, M>,
    ctx: &'a ApiContext,
}

impl<'a, T: Transport, M: PayloadMapper> DatabaseApi<'a, T, M> {
    pub fn new(rpc: &'a RpcClient<T, M>, ctx: &'a ApiContext) -> Self {
        Self { rpc, ctx }
    }

    fn request(&self, method: &str) -> RpcRequest {
        RpcRequest::new(self.ctx.api_ref(Api::Database), method)
    }

    pub async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, RpcError> {
        self.rpc
            .call(self.request("get_dynamic_global_properties"))
            .await
    }

    /// Look up accounts by name or object id. Unknown entries come back as `None`.
    pub async fn get_accounts(&self, names_or_ids: &[&str]) -> Result<Vec<Option<Account>>, RpcError> {
        self.rpc
            .call(self.request("get_accounts").param(json!(names_or_ids)))
            .await
    }

    pub async fn get_block(&self, block_num: u32) -> Result<Option<Block>, RpcError> {
        self.rpc
            .call(self.request("get_block").param(block_num))
            .await
    }
}
