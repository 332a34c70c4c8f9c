//! Native Ed25519 backend — `solana-keypair` signing.
//!
//! Only available with the `native-auth` feature.

use solana_keypair::Keypair;
use solana_signer::Signer;
use zeroize::Zeroizing;

use crate::signing::eddsa::Ed25519Backend;

/// Ed25519 backend built on the Solana keypair implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolanaKeypairBackend;

impl Ed25519Backend for SolanaKeypairBackend {
    fn name(&self) -> &'static str {
        "solana-keypair"
    }

    fn key_pair(&self) -> ([u8; 32], Zeroizing<[u8; 32]>) {
        let keypair = Keypair::new();
        let full = Zeroizing::new(keypair.to_bytes());
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&full[..32]);
        (keypair.pubkey().to_bytes(), secret)
    }

    fn key_pair_from_seed(&self, seed: &[u8; 32]) -> ([u8; 32], Zeroizing<[u8; 32]>) {
        let keypair = Keypair::new_from_array(*seed);
        (keypair.pubkey().to_bytes(), Zeroizing::new(*seed))
    }

    fn sign(&self, secret: &[u8; 32], message: &[u8]) -> [u8; 64] {
        let keypair = Keypair::new_from_array(*secret);
        let signature = keypair.sign_message(message);
        let mut out = [0u8; 64];
        out.copy_from_slice(signature.as_ref());
        out
    }
}
