//! Network broadcast API sub-client.

use serde::Serialize;

use crate::api::{Api, ApiContext};
use crate::error::RpcError;
use crate::rpc::{JsonMapper, PayloadMapper, RpcClient, RpcRequest, Transport};
use crate::signing::transaction::SignedTransaction;

/// Sub-client for the `network_broadcast` API.
pub struct NetworkBroadcastApi<'a, T: Transport, M: PayloadMapper = JsonMapper> {
    rpc: &'a RpcClient<T, M>,
    ctx: &'a ApiContext,
}

impl<'a, T: Transport, M: PayloadMapper> NetworkBroadcastApi<'a, T, M> {
    pub fn new(rpc: &'a RpcClient<T, M>, ctx: &'a ApiContext) -> Self {
        Self { rpc, ctx }
    }

    /// Submit a signed transaction. Resolves once the node accepted it into
    /// its pending pool, not when it is included in a block.
    pub async fn broadcast_transaction<Tx: Serialize>(
        &self,
        tx: &SignedTransaction<Tx>,
    ) -> Result<(), RpcError> {
        let body = serde_json::to_value(tx).map_err(|e| RpcError::Encode(e.to_string()))?;
        let request =
            RpcRequest::new(self.ctx.api_ref(Api::NetworkBroadcast), "broadcast_transaction")
                .param(body);
        self.rpc.call::<serde_json::Value>(request).await?;
        Ok(())
    }
}
