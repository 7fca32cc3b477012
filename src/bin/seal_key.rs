//! Encrypt a provider API key for storage in `user_api_keys`.
//!
//! Usage:
//!   cargo run --bin seal-key -- <api-key>     # Print the encrypted token
//!   cargo run --bin seal-key -- --generate    # Print a fresh ENCRYPTION_KEY
//!
//! Required environment variables (except with --generate):
//! - ENCRYPTION_KEY

use anyhow::{anyhow, bail, Context, Result};
use translation_gateway::credentials::SecretCipher;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let arg = std::env::args()
        .nth(1)
        .context("usage: seal-key <api-key> | --generate")?;

    if arg == "--generate" {
        println!("{}", SecretCipher::generate_key());
        return Ok(());
    }

    let api_key = arg.trim();
    if api_key.is_empty() {
        bail!("API key is empty");
    }

    let key = std::env::var("ENCRYPTION_KEY").context("ENCRYPTION_KEY not set")?;
    let cipher =
        SecretCipher::new(&key).ok_or_else(|| anyhow!("ENCRYPTION_KEY is not a valid Fernet key"))?;

    println!("{}", cipher.encrypt(api_key));
    Ok(())
}
