//! The transaction signing flow for a single signing request.
//!
//! A flow starts out [`SigningState::Unsigned`]. Approving it checks whether
//! the keyholder's signature would bring the request to its threshold: if
//! not, the request is signed right away and the flow ends up
//! [`SigningState::SignedOnly`]. Otherwise the flow is
//! [`SigningState::ReadyToPublish`] and the keyholder chooses between only
//! signing, or publishing the call on-chain.
//!
//! Steps that wait on the chain or the signer can outlive the user's interest
//! in the request. Every flow registers its request with a shared [`Focus`]
//! when approved. Steps on a request that is no longer focused are refused,
//! and results that arrive after the focus moved are discarded. Focus is
//! keyed by request identity, so a flow proceeds whenever its request is
//! focused, whichever flow focused it.

use crate::{
    address::Address,
    chain::{ChainError, ChainView},
    crypto::{Signature, H256},
    request::SigningRequest,
    signer::Signing,
    status::SigningRequestStatus,
};
use ethnum::U256;
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;

/// The state of a signing flow.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SigningState {
    Unsigned,
    /// Current status is being computed to decide how to proceed.
    AwaitingApproval,
    /// Our signature was produced and reported, nothing was sent on-chain.
    SignedOnly { signature: Signature },
    /// Our weight is enough to reach the threshold.
    ReadyToPublish {
        status: SigningRequestStatus,
        account: Address,
        our_weight: U256,
    },
    Published { transaction: H256 },
}

impl SigningState {
    fn name(&self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::AwaitingApproval => "awaiting approval",
            Self::SignedOnly { .. } => "signed",
            Self::ReadyToPublish { .. } => "ready to publish",
            Self::Published { .. } => "published",
        }
    }
}

/// The request that the user is currently acting on.
///
/// Clones share the focused request.
#[derive(Clone, Debug, Default)]
pub struct Focus(Arc<Mutex<Option<H256>>>);

impl Focus {
    /// Focuses the request with the specified key.
    pub fn activate(&self, key: H256) {
        *self.lock() = Some(key);
    }

    /// Clears the focus if it is on the request with the specified key.
    pub fn dismiss(&self, key: H256) {
        let mut focused = self.lock();
        if *focused == Some(key) {
            *focused = None;
        }
    }

    /// Returns `true` if the request with the specified key is focused.
    pub fn is_active(&self, key: H256) -> bool {
        *self.lock() == Some(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<Option<H256>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Callback receiving the signature produced by a flow.
pub type OnSignature<'a> = Box<dyn FnMut(Signature) + Send + 'a>;

/// A signing flow for a request, driven by user decisions.
pub struct SigningFlow<'a, C: ?Sized, S: ?Sized> {
    request: &'a SigningRequest,
    chain: &'a C,
    signer: &'a S,
    focus: Focus,
    key: H256,
    state: SigningState,
    on_signature: OnSignature<'a>,
}

impl<'a, C, S> SigningFlow<'a, C, S>
where
    C: ChainView + ?Sized,
    S: Signing + ?Sized,
{
    /// Creates a new flow for a request, collaborators are the multisig the
    /// request belongs to and the keyholder's signer.
    pub fn new(
        request: &'a SigningRequest,
        chain: &'a C,
        signer: &'a S,
        focus: Focus,
        on_signature: OnSignature<'a>,
    ) -> Self {
        Self {
            request,
            chain,
            signer,
            focus,
            key: request.key(),
            state: SigningState::Unsigned,
            on_signature,
        }
    }

    /// Returns the current state of the flow.
    pub fn state(&self) -> &SigningState {
        &self.state
    }

    /// Approves the request for signing.
    ///
    /// Signs immediately when our weight is not enough to reach the
    /// threshold. Chain and signer failures leave the flow unsigned.
    pub async fn approve(&mut self) -> Result<&SigningState, FlowError> {
        self.expect(matches!(self.state, SigningState::Unsigned), "approve")?;
        self.focus.activate(self.key);
        self.transition(SigningState::AwaitingApproval);

        let checked = Self::check_weights(self.request, self.chain, self.signer).await;
        let (status, account, our_weight) = match self.settle(checked) {
            Ok(checked) => checked,
            Err(err) => {
                self.state = SigningState::Unsigned;
                return Err(err);
            }
        };

        if status.is_publishable_with(our_weight) {
            self.transition(SigningState::ReadyToPublish {
                status,
                account,
                our_weight,
            });
            Ok(&self.state)
        } else {
            self.sign(SigningState::Unsigned).await
        }
    }

    /// Signs a request that could be published, leaving publication to
    /// another keyholder.
    ///
    /// The flow stays ready to publish when signing fails.
    pub async fn sign_only(&mut self) -> Result<&SigningState, FlowError> {
        self.expect(
            matches!(self.state, SigningState::ReadyToPublish { .. }),
            "sign",
        )?;
        self.ensure_focused()?;
        let prior = self.state.clone();
        self.sign(prior).await
    }

    /// Publishes the request on-chain with the signatures of the other
    /// keyholders, our own approval being implied by the submission.
    ///
    /// The flow stays ready to publish when submission fails so it can be
    /// retried.
    pub async fn publish(&mut self) -> Result<&SigningState, FlowError> {
        let signatures = match &self.state {
            SigningState::ReadyToPublish {
                status, account, ..
            } => status.signatures_excluding(*account),
            _ => return Err(self.invalid("publish")),
        };
        self.ensure_focused()?;

        let (request, chain) = (self.request, self.chain);
        let submitted = chain
            .submit(
                request.destination,
                request.value,
                &request.data,
                U256::from(request.nonce),
                &signatures,
            )
            .await
            .map_err(FlowError::from);

        let transaction = match self.settle(submitted) {
            Ok(transaction) => transaction,
            Err(err @ FlowError::Dismissed) => {
                self.state = SigningState::Unsigned;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        tracing::info!(
            %transaction,
            multisig = %self.chain.multisig(),
            nonce = request.nonce,
            "published signing request"
        );
        self.transition(SigningState::Published { transaction });
        Ok(&self.state)
    }

    /// Abandons the flow. Steps still in progress will have their results
    /// discarded.
    pub fn dismiss(&mut self) {
        self.focus.dismiss(self.key);
        self.transition(SigningState::Unsigned);
    }

    // Asynchronous helpers borrow the collaborators, never the flow.
    async fn check_weights(
        request: &SigningRequest,
        chain: &C,
        signer: &S,
    ) -> Result<(SigningRequestStatus, Address, U256), FlowError> {
        let status = request.status(chain).await?;
        let account = signer.address().await.map_err(FlowError::Signer)?;
        let our_weight = chain.weight(account).await?;
        tracing::debug!(
            %account,
            %our_weight,
            total_weight = %status.total_weight,
            threshold = %status.threshold,
            "checked signing weights"
        );
        Ok((status, account, our_weight))
    }

    /// Produces and reports our signature. Failures restore `prior`, unless
    /// the request was dismissed in the meantime.
    async fn sign(&mut self, prior: SigningState) -> Result<&SigningState, FlowError> {
        let signed = Self::produce_signature(self.request, self.chain, self.signer).await;
        let signature = match self.settle(signed) {
            Ok(signature) => signature,
            Err(err @ FlowError::Dismissed) => {
                self.state = SigningState::Unsigned;
                return Err(err);
            }
            Err(err) => {
                self.state = prior;
                return Err(err);
            }
        };

        (self.on_signature)(signature);
        self.transition(SigningState::SignedOnly { signature });
        Ok(&self.state)
    }

    async fn produce_signature(
        request: &SigningRequest,
        chain: &C,
        signer: &S,
    ) -> Result<Signature, FlowError> {
        let hash = request.hash(chain).await?;
        signer
            .sign_message(hash)
            .await
            .map_err(FlowError::Signer)
    }

    /// Checks the outcome of an asynchronous step against the focus.
    fn settle<T>(&self, result: Result<T, FlowError>) -> Result<T, FlowError> {
        if !self.focus.is_active(self.key) {
            tracing::debug!(request = %self.key, "discarding result for dismissed request");
            return Err(FlowError::Dismissed);
        }
        result.map_err(|err| {
            tracing::warn!(request = %self.key, %err, "signing flow step failed");
            err
        })
    }

    /// Refuses to start a step for a request that lost focus since approval.
    fn ensure_focused(&mut self) -> Result<(), FlowError> {
        if self.focus.is_active(self.key) {
            return Ok(());
        }
        tracing::debug!(request = %self.key, "refusing step for dismissed request");
        self.state = SigningState::Unsigned;
        Err(FlowError::Dismissed)
    }

    fn transition(&mut self, state: SigningState) {
        tracing::debug!(
            request = %self.key,
            from = self.state.name(),
            to = state.name(),
            "signing flow transition"
        );
        self.state = state;
    }

    fn expect(&self, allowed: bool, action: &'static str) -> Result<(), FlowError> {
        if allowed {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}

impl<C: ?Sized, S: ?Sized> Debug for SigningFlow<'_, C, S> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("SigningFlow")
            .field("request", &self.key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// An error progressing a signing flow.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("cannot {action} a request that is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("signing request was dismissed")]
    Dismissed,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("signer error: {0}")]
    Signer(#[source] anyhow::Error),
}
