use ethereum_consensus::{
    primitives::BlsPublicKey, signing::verify_signature, state_transition::Context,
};
use parking_lot::RwLock;
use relay_types::signing::compute_builder_signing_root;
use relay_types::SignedValidatorRegistration;
use std::{cmp::Ordering, collections::HashMap};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration has timestamp {0} but local time is {1}")]
    FutureRegistration(u64, u64),
    #[error("registration has timestamp {0} but a newer one ({1}) is already on file")]
    OutdatedRegistration(u64, u64),
    #[error("{0}")]
    Consensus(#[from] ethereum_consensus::Error),
}

enum Freshness {
    New,
    Existing,
    Outdated,
}

fn classify(timestamp: u64, latest_timestamp: u64) -> Freshness {
    match timestamp.cmp(&latest_timestamp) {
        Ordering::Less => Freshness::Outdated,
        Ordering::Equal => Freshness::Existing,
        Ordering::Greater => Freshness::New,
    }
}

/// The proposer-side counterpart to [`crate::registry::BuilderRegistry`]:
/// tracks each validator's latest fee-recipient/gas-limit preferences so the
/// slot scheduler can populate proposer duties and the delivery path can
/// attach refund evidence to a demotion. In-process only — registrations are
/// cheap to rebuild from the next gossip round and do not need a Datastore
/// tier of their own.
#[derive(Default)]
pub struct ValidatorRegistry {
    preferences: RwLock<HashMap<BlsPublicKey, SignedValidatorRegistration>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, public_key: &BlsPublicKey) -> Option<SignedValidatorRegistration> {
        self.preferences.read().get(public_key).cloned()
    }

    /// Verifies freshness and signature, then records the registration if it
    /// is newer than (or the first for) this public key. A registration for
    /// an already-current timestamp is accepted as a no-op duplicate rather
    /// than an error, matching how proposer software resends registrations
    /// every epoch regardless of whether preferences changed.
    pub fn process_registration(
        &self,
        mut registration: SignedValidatorRegistration,
        current_timestamp: u64,
        context: &Context,
    ) -> Result<(), RegistrationError> {
        let message = &registration.message;
        if message.timestamp > current_timestamp + 10 {
            return Err(RegistrationError::FutureRegistration(message.timestamp, current_timestamp))
        }

        let latest_timestamp =
            self.preferences.read().get(&message.public_key).map(|r| r.message.timestamp);

        if let Some(latest_timestamp) = latest_timestamp {
            if matches!(classify(message.timestamp, latest_timestamp), Freshness::Outdated) {
                return Err(RegistrationError::OutdatedRegistration(message.timestamp, latest_timestamp))
            }
        }

        let public_key = message.public_key.clone();
        let signing_root = compute_builder_signing_root(&mut registration.message, context)?;
        verify_signature(&public_key, signing_root.as_ref(), &registration.signature)?;

        let is_new = latest_timestamp.is_none();
        self.preferences.write().insert(public_key.clone(), registration);
        if is_new {
            trace!(%public_key, "recorded new validator registration");
        }
        Ok(())
    }

    pub fn process_registrations(
        &self,
        registrations: Vec<SignedValidatorRegistration>,
        current_timestamp: u64,
        context: &Context,
    ) -> Vec<RegistrationError> {
        registrations
            .into_iter()
            .filter_map(|registration| {
                self.process_registration(registration, current_timestamp, context).err()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.preferences.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_consensus::{
        builder::ValidatorRegistration, crypto::SecretKey, primitives::ExecutionAddress,
    };
    use rand::thread_rng;
    use relay_types::signing::sign_builder_message;

    fn signed_registration(
        signing_key: &SecretKey,
        timestamp: u64,
        context: &Context,
    ) -> SignedValidatorRegistration {
        let mut message = ValidatorRegistration {
            fee_recipient: ExecutionAddress::default(),
            gas_limit: 30_000_000,
            timestamp,
            public_key: signing_key.public_key(),
        };
        let signature = sign_builder_message(&mut message, signing_key, context).unwrap();
        SignedValidatorRegistration { message, signature }
    }

    #[test]
    fn accepts_first_registration_and_rejects_an_older_resubmission() {
        let context = Context::for_mainnet();
        let signing_key = SecretKey::random(&mut thread_rng()).unwrap();
        let registry = ValidatorRegistry::new();

        registry.process_registration(signed_registration(&signing_key, 100, &context), 100, &context).unwrap();
        assert!(registry.get(&signing_key.public_key()).is_some());

        let err = registry
            .process_registration(signed_registration(&signing_key, 50, &context), 100, &context)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::OutdatedRegistration(50, 100)));
    }

    #[test]
    fn a_resubmission_at_the_same_timestamp_is_accepted_as_a_no_op() {
        let context = Context::for_mainnet();
        let signing_key = SecretKey::random(&mut thread_rng()).unwrap();
        let registry = ValidatorRegistry::new();

        registry.process_registration(signed_registration(&signing_key, 100, &context), 100, &context).unwrap();
        registry.process_registration(signed_registration(&signing_key, 100, &context), 100, &context).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_a_registration_timestamped_too_far_in_the_future() {
        let context = Context::for_mainnet();
        let signing_key = SecretKey::random(&mut thread_rng()).unwrap();
        let registry = ValidatorRegistry::new();

        let err = registry
            .process_registration(signed_registration(&signing_key, 1_000, &context), 100, &context)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::FutureRegistration(1_000, 100)));
    }

    #[test]
    fn rejects_a_registration_with_an_invalid_signature() {
        let context = Context::for_mainnet();
        let signing_key = SecretKey::random(&mut thread_rng()).unwrap();
        let other_key = SecretKey::random(&mut thread_rng()).unwrap();
        let registry = ValidatorRegistry::new();

        let mut registration = signed_registration(&signing_key, 100, &context);
        registration.message.public_key = other_key.public_key();

        assert!(registry.process_registration(registration, 100, &context).is_err());
    }
}
