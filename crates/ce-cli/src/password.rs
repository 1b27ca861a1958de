//! # Hash Password Subcommand
//!
//! ```bash
//! ce hash-password --password 's3cret'
//! printf 's3cret\n' | ce hash-password
//! ```

use std::io::BufRead;

use anyhow::{bail, Context, Result};
use clap::Args;

use ce_core::hash_password;

/// Arguments for `ce hash-password`.
#[derive(Args, Debug)]
pub struct HashPasswordArgs {
    /// Password to hash. Read from the first line of stdin when omitted,
    /// which keeps it out of shell history.
    #[arg(long)]
    pub password: Option<String>,
}

/// Execute `ce hash-password`.
pub fn run_hash_password(args: &HashPasswordArgs) -> Result<u8> {
    let password = match &args.password {
        Some(p) => p.clone(),
        None => read_password(std::io::stdin().lock())?,
    };
    println!("{}", hash_checked(&password)?);
    Ok(0)
}

/// Read the password from the first line of `reader`, without the line
/// terminator.
pub fn read_password(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Hash `password`, refusing empty input.
pub fn hash_checked(password: &str) -> Result<String> {
    if password.is_empty() {
        bail!("password must not be empty");
    }
    let hash = hash_password(password).context("failed to hash password")?;
    tracing::debug!("password hashed");
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ce_core::password::is_phc_hash;
    use ce_core::verify_password;

    #[test]
    fn reads_first_line_only() {
        let input = b"hunter22\r\nsecond line\n";
        assert_eq!(read_password(&input[..]).unwrap(), "hunter22");
    }

    #[test]
    fn hash_verifies() {
        let hash = hash_checked("hunter22").unwrap();
        assert!(is_phc_hash(&hash));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn empty_password_rejected() {
        let err = hash_checked("").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }
}
