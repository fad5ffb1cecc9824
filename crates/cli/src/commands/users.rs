//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Password is read from the first line of stdin
//! echo 'correct horse battery' | bazaar-cli user create -e seller@example.com
//! ```

use std::io::BufRead;

use bazaar_storefront::services::auth::AuthService;

use super::{CommandError, connect};

/// Create a user with the same rules as web registration.
///
/// # Errors
///
/// Returns an error if the password cannot be read, the email or password is
/// invalid, or the email is already registered.
pub async fn create(email: &str) -> Result<(), CommandError> {
    let password = read_password(std::io::stdin().lock())?;
    let pool = connect().await?;

    let user = AuthService::new(&pool)
        .register(email, &password, &password)
        .await?;

    tracing::info!("User created successfully! ID: {}, Email: {}", user.id, user.email);
    Ok(())
}

/// First line of `input`, without its line terminator.
fn read_password(mut input: impl BufRead) -> Result<String, CommandError> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
