//! Typed wrappers over the node's RPC APIs.
//!
//! Nodes expose APIs by name but address them by a numeric id that is only
//! known after login. [`ApiContext`] holds that mapping; it is resolved once
//! per connection and then passed to each sub-client.
//!
//! ```rust,ignore
//! let ctx = ApiContext::resolve(&rpc).await?;
//! let props = rpc.database(&ctx).get_dynamic_global_properties().await?;
//! ```

pub mod broadcast;
pub mod database;
pub mod history;
pub mod node;
pub mod wire;

use std::collections::HashMap;

use crate::error::RpcError;
use crate::rpc::{ApiRef, PayloadMapper, RpcClient, RpcRequest, Transport};

pub use broadcast::NetworkBroadcastApi;
pub use database::DatabaseApi;
pub use history::AccountHistoryApi;
pub use node::NetworkNodeApi;

/// The login API is always reachable at this id.
pub const LOGIN_API_ID: u32 = 1;

/// Node APIs this SDK knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    Login,
    Database,
    NetworkBroadcast,
    NetworkNode,
    AccountHistory,
}

impl Api {
    pub const ALL: [Api; 5] = [
        Api::Login,
        Api::Database,
        Api::NetworkBroadcast,
        Api::NetworkNode,
        Api::AccountHistory,
    ];

    /// Name the node registers the API under.
    pub fn name(&self) -> &'static str {
        match self {
            Api::Login => "login",
            Api::Database => "database",
            Api::NetworkBroadcast => "network_broadcast",
            Api::NetworkNode => "network_node",
            Api::AccountHistory => "history",
        }
    }
}

impl std::fmt::Display for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── ApiContext ──────────────────────────────────────────────────────────────

/// Immutable API name → numeric id mapping for one connection.
///
/// APIs without an id are addressed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiContext {
    ids: HashMap<Api, u32>,
}

impl Default for ApiContext {
    fn default() -> Self {
        let mut ids = HashMap::new();
        ids.insert(Api::Login, LOGIN_API_ID);
        Self { ids }
    }
}

impl ApiContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, api: Api, id: u32) -> Self {
        self.ids.insert(api, id);
        self
    }

    pub fn id(&self, api: Api) -> Option<u32> {
        self.ids.get(&api).copied()
    }

    pub fn api_ref(&self, api: Api) -> ApiRef {
        match self.id(api) {
            Some(id) => ApiRef::Id(id),
            None => ApiRef::Name(api.name().to_string()),
        }
    }

    /// Ask the login API for the id of every known API.
    ///
    /// APIs the node does not enable are left unresolved rather than failing
    /// the whole lookup.
    pub async fn resolve<T, M>(rpc: &RpcClient<T, M>) -> Result<Self, RpcError>
    where
        T: Transport,
        M: PayloadMapper,
    {
        let mut ctx = Self::new();
        for api in Api::ALL.into_iter().filter(|api| *api != Api::Login) {
            let request = RpcRequest::new(LOGIN_API_ID, "get_api_by_name").param(api.name());
            match rpc.call::<Option<u32>>(request).await? {
                Some(id) => {
                    tracing::debug!("Resolved API {} → {}", api, id);
                    ctx.ids.insert(api, id);
                }
                None => tracing::warn!("API {} is not enabled on this node", api),
            }
        }
        Ok(ctx)
    }
}

// ─── RpcClient accessors ─────────────────────────────────────────────────────

impl<T: Transport, M: PayloadMapper> RpcClient<T, M> {
    pub fn database<'a>(&'a self, ctx: &'a ApiContext) -> DatabaseApi<'a, T, M> {
        DatabaseApi::new(self, ctx)
    }

    pub fn network_broadcast<'a>(&'a self, ctx: &'a ApiContext) -> NetworkBroadcastApi<'a, T, M> {
        NetworkBroadcastApi::new(self, ctx)
    }

    pub fn network_node<'a>(&'a self, ctx: &'a ApiContext) -> NetworkNodeApi<'a, T, M> {
        NetworkNodeApi::new(self, ctx)
    }

    pub fn account_history<'a>(&'a self, ctx: &'a ApiContext) -> AccountHistoryApi<'a, T, M> {
        AccountHistoryApi::new(self, ctx)
    }
}
