pub use ethereum_consensus::signing::verify_signature;
use ethereum_consensus::{
    builder::compute_builder_domain,
    crypto::SecretKey,
    primitives::{BlsPublicKey, BlsSignature, Root},
    signing::{compute_signing_root, sign_with_domain, verify_signed_data},
    ssz::prelude::SimpleSerialize,
    state_transition::{Context, Error},
};

/// Signs `message` under the builder domain, as every BLS-bearing object on the
/// builder side of the wire (bid traces, builder bids, validator registrations) does.
pub fn sign_builder_message<T: SimpleSerialize>(
    message: &mut T,
    signing_key: &SecretKey,
    context: &Context,
) -> Result<BlsSignature, Error> {
    let domain = compute_builder_domain(context)?;
    sign_with_domain(message, signing_key, domain)
}

pub fn compute_builder_signing_root<T: SimpleSerialize>(
    data: &mut T,
    context: &Context,
) -> Result<Root, Error> {
    let domain = compute_builder_domain(context)?;
    compute_signing_root(data, domain)
}

pub fn verify_signed_builder_message<T: SimpleSerialize>(
    message: &mut T,
    signature: &BlsSignature,
    public_key: &BlsPublicKey,
    context: &Context,
) -> Result<(), Error> {
    let domain = compute_builder_domain(context)?;
    verify_signed_data(message, signature, public_key, domain)
}
