//! HTTP routes for collecting signatures and publishing signing requests.

use crate::{
    abi::DecodingError,
    address::{Address, ParseAddressError},
    chain::{remote::RemoteChain, ChainError, ChainView},
    crypto::{Signature, H256},
    keyholders::{self, Registry},
    node::{types::LogFilter, Remote, RemoteError},
    orchestrator::{FlowError, Focus, SigningFlow, SigningState},
    request::{RequestArgs, RequestError, SigningRequest, SigningRequestRecord},
    serialization::{Bytes, Quantity},
    signer::{log_recorder::LogRecorder, remote::NodeSigner, BoxSigner},
    status::SigningRequestStatus,
    store::{RequestStore, StoreError},
};
use rocket::{
    http::Status,
    request::FromParam,
    response::{self, Responder},
    serde::json::Json,
    Route, State,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;

/// Creates a view of the multisig contract at an address.
pub type ChainFactory = Box<dyn Fn(Address) -> Box<dyn ChainView> + Send + Sync>;

/// Shared state of the HTTP service.
pub struct Service {
    remote: Arc<Remote>,
    from_block: u64,
    chains: ChainFactory,
    signer: BoxSigner,
    store: Box<dyn RequestStore>,
    registry: Mutex<Registry>,
}

impl Service {
    /// Creates a new service signing and submitting with a node managed
    /// `account`.
    pub fn new(
        remote: Arc<Remote>,
        account: Address,
        from_block: u64,
        store: Box<dyn RequestStore>,
    ) -> Self {
        let chains: ChainFactory = {
            let remote = remote.clone();
            Box::new(move |multisig| -> Box<dyn ChainView> {
                Box::new(RemoteChain::new(remote.clone(), multisig).with_sender(account))
            })
        };
        let signer = Box::new(LogRecorder(NodeSigner::new(remote.clone(), Some(account))));
        Self::with_collaborators(remote, from_block, store, chains, signer)
    }

    /// Creates a new service with explicit multisig views and signer. The
    /// remote node is only used for keyholder logs.
    pub fn with_collaborators(
        remote: Arc<Remote>,
        from_block: u64,
        store: Box<dyn RequestStore>,
        chains: ChainFactory,
        signer: BoxSigner,
    ) -> Self {
        Self {
            remote,
            from_block,
            chains,
            signer,
            store,
            registry: Default::default(),
        }
    }

    fn chain(&self, multisig: Address) -> Box<dyn ChainView> {
        (self.chains)(multisig)
    }

    async fn request(&self, multisig: Address, id: H256) -> Result<SigningRequest, ApiError> {
        let record = self.store.get(multisig, id).await?;
        Ok(SigningRequest::try_from(record)?)
    }

    async fn refresh_keyholders(
        &self,
        filter_for: impl FnOnce(&Registry) -> LogFilter,
    ) -> Result<(), ApiError> {
        let filter = filter_for(&self.registry());
        let logs = keyholders::fetch_logs(&self.remote, filter).await?;
        let mut registry = self.registry();
        for log in &logs {
            registry.apply(log)?;
        }
        Ok(())
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns all routes of the service.
pub fn routes() -> Vec<Route> {
    rocket::routes![
        list_requests,
        create_request,
        add_signature,
        request_status,
        approve_request,
        multisig_keyholders,
        owned_wallets,
    ]
}

#[rocket::get("/multisig/<multisig>/requests")]
async fn list_requests(
    service: &State<Service>,
    multisig: Address,
) -> Result<Json<Vec<SigningRequestRecord>>, ApiError> {
    Ok(Json(service.store.list(multisig).await?))
}

#[rocket::post("/multisig/<multisig>/requests", data = "<args>")]
async fn create_request(
    service: &State<Service>,
    multisig: Address,
    args: Json<RequestArgs>,
) -> Result<Json<SigningRequestRecord>, ApiError> {
    let request = SigningRequest::new(args.into_inner())?;
    let hash = request.hash(&*service.chain(multisig)).await?;
    let record = SigningRequestRecord::new(hash, &request)?;
    Ok(Json(service.store.create(multisig, record).await?))
}

#[derive(Deserialize)]
struct NewSignature {
    signature: Bytes,
}

#[rocket::post("/multisig/<multisig>/requests/<id>/signatures", data = "<body>")]
async fn add_signature(
    service: &State<Service>,
    multisig: Address,
    id: H256,
    body: Json<NewSignature>,
) -> Result<Json<SigningRequestRecord>, ApiError> {
    let record = service
        .store
        .add_signature(multisig, id, &body.signature)
        .await?;
    Ok(Json(record))
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    status: SigningRequestStatus,
    description: String,
}

#[rocket::get("/multisig/<multisig>/requests/<id>/status")]
async fn request_status(
    service: &State<Service>,
    multisig: Address,
    id: H256,
) -> Result<Json<StatusResponse>, ApiError> {
    let request = service.request(multisig, id).await?;
    let status = request.status(&*service.chain(multisig)).await?;
    Ok(Json(StatusResponse {
        status,
        description: request.describe().to_string(),
    }))
}

#[derive(Deserialize)]
struct Approval {
    #[serde(default)]
    publish: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<Signature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction: Option<H256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<SigningRequestRecord>,
}

#[rocket::post("/multisig/<multisig>/requests/<id>/approve", data = "<approval>")]
async fn approve_request(
    service: &State<Service>,
    multisig: Address,
    id: H256,
    approval: Json<Approval>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let request = service.request(multisig, id).await?;
    let chain = service.chain(multisig);

    let mut produced = None;
    let mut flow = SigningFlow::new(
        &request,
        &*chain,
        &*service.signer,
        Focus::default(),
        Box::new(|signature: Signature| produced = Some(signature)),
    );
    let ready = matches!(flow.approve().await?, SigningState::ReadyToPublish { .. });
    if ready && approval.publish {
        flow.publish().await?;
    } else if ready {
        flow.sign_only().await?;
    }
    let state = flow.state().clone();
    drop(flow);

    let mut response = ApprovalResponse::default();
    if let SigningState::Published { transaction } = state {
        response.transaction = Some(transaction);
    }
    if let Some(signature) = produced {
        response.signature = Some(signature);
        response.record = Some(
            service
                .store
                .add_signature(multisig, id, &signature.to_vec())
                .await?,
        );
    }
    Ok(Json(response))
}

#[rocket::get("/multisig/<multisig>/keyholders")]
async fn multisig_keyholders(
    service: &State<Service>,
    multisig: Address,
) -> Result<Json<BTreeMap<Address, Quantity>>, ApiError> {
    service
        .refresh_keyholders(|registry| registry.multisig_filter(multisig, service.from_block))
        .await?;
    let keyholders = service.registry().keyholders(multisig);
    Ok(Json(
        keyholders
            .into_iter()
            .map(|(keyholder, weight)| (keyholder, Quantity(weight)))
            .collect(),
    ))
}

#[rocket::get("/keyholders/<owner>/wallets")]
async fn owned_wallets(
    service: &State<Service>,
    owner: Address,
) -> Result<Json<Vec<Address>>, ApiError> {
    service
        .refresh_keyholders(|registry| registry.owner_filter(owner, service.from_block))
        .await?;
    Ok(Json(service.registry().owned_wallets(owner)))
}

impl<'a> FromParam<'a> for Address {
    type Error = ParseAddressError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl<'a> FromParam<'a> for H256 {
    type Error = hex::FromHexError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

/// An error handling an HTTP request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("node error: {0}")]
    Node(#[from] RemoteError),
    #[error("invalid keyholder log: {0}")]
    Log(#[from] DecodingError),
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            Self::Request(_)
            | Self::Store(StoreError::InvalidSignature(_) | StoreError::Request(_)) => {
                Status::BadRequest
            }
            Self::Store(StoreError::NotFound(_)) => Status::NotFound,
            Self::Store(StoreError::Duplicate(_))
            | Self::Flow(FlowError::InvalidTransition { .. } | FlowError::Dismissed) => {
                Status::Conflict
            }
            Self::Chain(_)
            | Self::Flow(FlowError::Chain(_) | FlowError::Signer(_))
            | Self::Node(_)
            | Self::Log(_) => Status::BadGateway,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r rocket::Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            tracing::warn!(err = %self, "request failed");
        } else {
            tracing::debug!(err = %self, "rejected request");
        }
        (status, Json(json!({ "error": self.to_string() }))).respond_to(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::MemoryStore,
        testing::{FakeChain, FakeSigner, Keyholder},
    };
    use ethnum::U256;
    use rocket::{
        http::ContentType,
        local::blocking::{Client, LocalResponse},
    };
    use serde_json::Value;

    const MULTISIG: Address = Address([0x5e; 20]);
    const DESTINATION: Address = Address([0xaa; 20]);
    const ID: H256 = H256([0x11; 32]);

    /// Keyholders with weights 2 and 3, and the service's own account with
    /// weight 1.
    struct Setup {
        chain: FakeChain,
        alice: Keyholder,
        bob: Keyholder,
        me: Keyholder,
    }

    fn setup(threshold: u128) -> Setup {
        let chain = FakeChain::new(MULTISIG);
        let (alice, bob, me) = (Keyholder::new(1), Keyholder::new(2), Keyholder::new(3));
        chain.set_weight(alice.address, 2);
        chain.set_weight(bob.address, 3);
        chain.set_weight(me.address, 1);
        chain.set_threshold(threshold);
        Setup {
            chain,
            alice,
            bob,
            me,
        }
    }

    /// The canonical hash of a ping to `DESTINATION` at nonce 7.
    fn ping_hash(setup: &Setup) -> H256 {
        setup
            .chain
            .local_hash(DESTINATION, U256::ZERO, &[], U256::new(7))
    }

    fn record(id: H256, signatures: Vec<Bytes>) -> SigningRequestRecord {
        SigningRequestRecord {
            id,
            destination: DESTINATION,
            value: Quantity::default(),
            data: Bytes::default(),
            abi: None,
            nonce: 7,
            signatures,
            description: None,
        }
    }

    fn client(setup: &Setup, records: Vec<SigningRequestRecord>) -> Client {
        let store = MemoryStore::default();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        for record in records {
            runtime.block_on(store.create(MULTISIG, record)).unwrap();
        }

        let remote = Arc::new(Remote::new("http://localhost:8545".parse().unwrap()));
        let chain = setup.chain.clone();
        let service = Service::with_collaborators(
            remote,
            0,
            Box::new(store),
            Box::new(move |_: Address| -> Box<dyn ChainView> { Box::new(chain.clone()) }),
            Box::new(FakeSigner::new(setup.me.clone())),
        );
        Client::tracked(rocket::build().manage(service).mount("/", routes())).unwrap()
    }

    fn post(client: &Client, uri: String, body: Value) -> LocalResponse<'_> {
        client
            .post(uri)
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
    }

    #[test]
    fn lists_requests() {
        let setup = setup(4);
        let client = client(&setup, vec![record(ID, vec![])]);

        let response = client
            .get(format!("/multisig/{MULTISIG}/requests"))
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.into_json::<Value>().unwrap(),
            json!([serde_json::to_value(record(ID, vec![])).unwrap()]),
        );

        let response = client
            .get(format!("/multisig/{}/requests", Address([0x42; 20])))
            .dispatch();
        assert_eq!(response.into_json::<Value>().unwrap(), json!([]));
    }

    #[test]
    fn creates_requests_identified_by_canonical_hash() {
        let setup = setup(4);
        let client = client(&setup, vec![]);
        let body = json!({
            "destination": DESTINATION.to_string(),
            "value": "1000000000000000000",
            "nonce": 7,
        });

        let response = post(&client, format!("/multisig/{MULTISIG}/requests"), body.clone());
        assert_eq!(response.status(), Status::Ok);
        let record = response.into_json::<SigningRequestRecord>().unwrap();
        assert_eq!(
            record.id,
            setup.chain.local_hash(
                DESTINATION,
                U256::new(1_000_000_000_000_000_000),
                &[],
                U256::new(7),
            ),
        );
        assert!(record.signatures.is_empty());

        let response = post(&client, format!("/multisig/{MULTISIG}/requests"), body);
        assert_eq!(response.status(), Status::Conflict);

        let response = post(
            &client,
            format!("/multisig/{MULTISIG}/requests"),
            json!({
                "destination": DESTINATION.to_string(),
                "data": "0x12345678",
                "inputs": [],
                "nonce": 8,
            }),
        );
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[test]
    fn adds_signatures() {
        let setup = setup(4);
        let client = client(&setup, vec![record(ID, vec![])]);
        let signature = setup.alice.sign(ID);

        let response = post(
            &client,
            format!("/multisig/{MULTISIG}/requests/{ID}/signatures"),
            json!({ "signature": signature.to_string() }),
        );
        assert_eq!(response.status(), Status::Ok);
        let record = response.into_json::<SigningRequestRecord>().unwrap();
        assert_eq!(record.signatures, vec![Bytes(signature.to_vec())]);
    }

    #[test]
    fn reports_status() {
        let setup = setup(4);
        let hash = ping_hash(&setup);
        let signatures = vec![
            Bytes(setup.alice.sign(hash).to_vec()),
            Bytes(vec![1, 2]),
        ];
        let client = client(&setup, vec![record(hash, signatures)]);

        let response = client
            .get(format!("/multisig/{MULTISIG}/requests/{hash}/status"))
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        let status = response.into_json::<Value>().unwrap();
        assert_eq!(status["totalWeight"], json!("0x2"));
        assert_eq!(status["threshold"], json!("0x4"));
        assert_eq!(status["description"], json!(format!("Call {DESTINATION}")));
        assert_eq!(
            status["signatories"][setup.alice.address.to_string()]["weight"],
            json!("0x2"),
        );
        assert_eq!(status["invalid"][0]["index"], json!(1));

        let unknown = H256([0x22; 32]);
        let response = client
            .get(format!("/multisig/{MULTISIG}/requests/{unknown}/status"))
            .dispatch();
        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn approval_below_threshold_stores_signature() {
        let setup = setup(10);
        let hash = ping_hash(&setup);
        let signatures = vec![Bytes(setup.alice.sign(hash).to_vec())];
        let client = client(&setup, vec![record(hash, signatures)]);

        let response = post(
            &client,
            format!("/multisig/{MULTISIG}/requests/{hash}/approve"),
            json!({ "publish": true }),
        );
        assert_eq!(response.status(), Status::Ok);
        let approval = response.into_json::<Value>().unwrap();
        assert_eq!(
            approval["signature"],
            json!(setup.me.sign(hash).to_string()),
        );
        assert_eq!(approval["record"]["signatures"].as_array().unwrap().len(), 2);
        assert!(approval.get("transaction").is_none());
        assert!(setup.chain.submissions().is_empty());
    }

    #[test]
    fn approval_at_threshold_signs_or_publishes() {
        let setup = setup(5);
        let hash = ping_hash(&setup);
        let signatures = vec![
            Bytes(setup.alice.sign(hash).to_vec()),
            Bytes(setup.bob.sign(hash).to_vec()),
        ];
        let client = client(&setup, vec![record(hash, signatures)]);
        let uri = format!("/multisig/{MULTISIG}/requests/{hash}/approve");

        let response = post(&client, uri.clone(), json!({ "publish": false }));
        assert_eq!(response.status(), Status::Ok);
        let approval = response.into_json::<Value>().unwrap();
        assert!(approval["signature"].is_string());
        assert_eq!(approval["record"]["signatures"].as_array().unwrap().len(), 3);
        assert!(setup.chain.submissions().is_empty());

        let response = post(&client, uri, json!({ "publish": true }));
        assert_eq!(response.status(), Status::Ok);
        let approval = response.into_json::<Value>().unwrap();
        let submissions = setup.chain.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            approval["transaction"],
            json!(submissions[0].transaction.to_string()),
        );
        assert!(approval.get("signature").is_none());
        // Our own signature is implied by the submission.
        assert_eq!(submissions[0].signatures.len(), 2);
    }

    #[test]
    fn approval_chain_failures_are_bad_gateway() {
        let setup = setup(10);
        let hash = ping_hash(&setup);
        let client = client(&setup, vec![record(hash, vec![])]);
        setup.chain.fail_calls(true);

        let response = post(
            &client,
            format!("/multisig/{MULTISIG}/requests/{hash}/approve"),
            json!({}),
        );
        assert_eq!(response.status(), Status::BadGateway);
        assert!(response.into_json::<Value>().unwrap()["error"].is_string());
    }

    #[test]
    fn maps_errors_to_statuses() {
        let setup = setup(4);
        let client = client(&setup, vec![record(ID, vec![])]);

        let response = post(
            &client,
            format!("/multisig/{MULTISIG}/requests/{ID}/signatures"),
            json!({ "signature": "0x0102" }),
        );
        assert_eq!(response.status(), Status::BadRequest);

        let unknown = H256([0x22; 32]);
        let response = post(
            &client,
            format!("/multisig/{MULTISIG}/requests/{unknown}/signatures"),
            json!({ "signature": setup.alice.sign(unknown).to_string() }),
        );
        assert_eq!(response.status(), Status::NotFound);
        assert!(response.into_json::<Value>().unwrap()["error"].is_string());
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            ApiError::Flow(FlowError::Dismissed).status(),
            Status::Conflict,
        );
        assert_eq!(
            ApiError::Chain(ChainError::Submit(anyhow::anyhow!("reverted"))).status(),
            Status::BadGateway,
        );
        assert_eq!(
            ApiError::Request(RequestError::Malformed(
                crate::request::MalformedRequest::DataAndInputs
            ))
            .status(),
            Status::BadRequest,
        );
    }
}
