//! Account history API sub-client.

use crate::api::wire::HistoryEntry;
use crate::api::{Api, ApiContext};
use crate::error::RpcError;
use crate::rpc::{JsonMapper, PayloadMapper, RpcClient, RpcRequest, Transport};

/// Sub-client for the `history` API.
pub struct AccountHistoryApi<'a, T: Transport, M: PayloadMapper = JsonMapper> {
    rpc: &'a RpcClient<T, M>,
    ctx: &'a ApiContext,
}

impl<'a, T: Transport, M: PayloadMapper> AccountHistoryApi<'a, T, M> {
    pub fn new(rpc: &'a RpcClient<T, M>, ctx: &'a ApiContext) -> Self {
        Self { rpc, ctx }
    }

    /// Up to `limit` operations for `account`, newest first, starting at
    /// operation sequence `from` (`0` means most recent).
    pub async fn get_account_history(
        &self,
        account: &str,
        from: u64,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>, RpcError> {
        let request = RpcRequest::new(self.ctx.api_ref(Api::AccountHistory), "get_account_history")
            .param(account)
            .param(from)
            .param(limit);
        self.rpc.call(request).await
    }
}
