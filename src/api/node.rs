//! Network node API sub-client.

use crate::api::wire::PeerStatus;
use crate::api::{Api, ApiContext};
use crate::error::RpcError;
use crate::rpc::{JsonMapper, PayloadMapper, RpcClient, RpcRequest, Transport};

/// Sub-client for the `network_node` API.
pub struct NetworkNodeApi<'a, T: Transport, M: PayloadMapper = JsonMapper> {
    rpc: &'a RpcClient<T, M>,
    ctx: &'a ApiContext,
}

impl<'a, T: Transport, M: PayloadMapper> NetworkNodeApi<'a, T, M> {
    pub fn new(rpc: &'a RpcClient<T, M>, ctx: &'a ApiContext) -> Self {
        Self { rpc, ctx }
    }

    pub async fn get_connected_peers(&self) -> Result<Vec<PeerStatus>, RpcError> {
        self.rpc
            .call(RpcRequest::new(
                self.ctx.api_ref(Api::NetworkNode),
                "get_connected_peers",
            ))
            .await
    }
}
