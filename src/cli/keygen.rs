use crate::{crypto, info};

/// Prints a fresh value for `TOKEN_ENCRYPTION_KEY`.
pub fn keygen() {
    info!("Add this line to your .env file:");
    println!("TOKEN_ENCRYPTION_KEY={}", crypto::generate_key());
}
