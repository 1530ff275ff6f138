use anyhow::Result;
use metamultisig::{
    address::Address,
    multisig::DEPLOYMENT_BLOCK,
    node::Remote,
    serialization::Str,
    service::{self, Service},
    signer::{remote::NodeSigner, Signing as _},
    store::MemoryStore,
};
use reqwest::Url;
use rocket::{fairing::AdHoc, serde::Deserialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
struct Config {
    /// The remote node used for contract calls, signing and submitting
    /// transactions.
    remote_node_url: Str<Url>,

    /// The keyholder account managed by the remote node. Defaults to the
    /// node's first account.
    #[serde(default)]
    account: Option<Address>,

    /// The block from which keyholder changes are scanned.
    #[serde(default = "default_from_block")]
    from_block: u64,
}

fn default_from_block() -> u64 {
    DEPLOYMENT_BLOCK
}

#[rocket::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let result = rocket::build()
        .attach(AdHoc::config::<Config>())
        .attach(AdHoc::try_on_ignite("metamultisig::Service", |rocket| async {
            let config = match rocket.state::<Config>() {
                Some(config) => config,
                None => return Err(rocket),
            };
            match init(config).await {
                Ok(service) => Ok(rocket.manage(service)),
                Err(err) => {
                    tracing::error!(?err, "failed to initialize service");
                    Err(rocket)
                }
            }
        }))
        .mount("/", service::routes())
        .launch()
        .await;

    if let Err(err) = result {
        tracing::error!(%err, "server terminated");
    }
}

async fn init(config: &Config) -> Result<Service> {
    let remote = Arc::new(Remote::new(config.remote_node_url.0.clone()));
    tracing::debug!(url = %remote.url(), "connected to remote node");

    let account = NodeSigner::new(remote.clone(), config.account)
        .address()
        .await?;
    tracing::info!(%account, from_block = config.from_block, "using keyholder account");

    Ok(Service::new(
        remote,
        account,
        config.from_block,
        Box::new(MemoryStore::default()),
    ))
}
