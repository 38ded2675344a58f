//! Sign-in, sign-out and account confirmation.
//!
//! `login` prints the provider's authorization URL and waits for the
//! redirect on the configured `BAKEHOUSE_OIDC_REDIRECT_URI`, which must
//! point at a loopback address.

use bakehouse_storefront::Storefront;
use bakehouse_storefront::session::SessionStatus;

use crate::callback;
use crate::error::CliError;

/// Sign in (or sign up) through the identity provider.
pub async fn login(storefront: &Storefront, return_to: &str, sign_up: bool) -> Result<(), CliError> {
    let session = storefront.session()?;

    if let SessionStatus::Authenticated(user) = session.status() {
        println!("Already signed in as {}.", user.email.as_deref().unwrap_or(user.id.as_str()));
        return Ok(());
    }

    let redirect_uri = storefront
        .config()
        .oidc
        .as_ref()
        .map(|oidc| oidc.redirect_uri.clone())
        .ok_or_else(|| CliError::InvalidInput("sign-in is not configured".to_string()))?;

    // Listen before handing out the URL so a fast provider cannot beat us.
    let listener = callback::CallbackListener::bind(&redirect_uri).await?;

    let url = if sign_up {
        session.sign_up(return_to).await?
    } else {
        session.sign_in(return_to).await?
    };

    println!("Open this URL in your browser to continue:\n\n  {url}\n");
    println!("Waiting for the provider to redirect back to {redirect_uri} ...");

    let params = listener.wait().await?;
    let return_path = session.complete_sign_in(&params).await?;

    if let SessionStatus::Authenticated(user) = session.status() {
        println!(
            "Signed in as {}.",
            user.email.as_deref().unwrap_or(user.id.as_str())
        );
    }
    if return_path != "/" {
        println!("Continue at {return_path}");
    }
    Ok(())
}

/// Sign out and print the provider's logout URL, if any.
pub async fn logout(storefront: &Storefront) -> Result<(), CliError> {
    let session = storefront.session()?;

    match session.sign_out(None).await {
        Some(url) => println!("Signed out. To end the provider session too, open:\n\n  {url}"),
        None => println!("Signed out."),
    }
    Ok(())
}

/// Print the signed-in user.
pub async fn whoami(storefront: &Storefront) -> Result<(), CliError> {
    let session = storefront.session()?;

    match session.status() {
        SessionStatus::Authenticated(user) => {
            println!("Customer: {}", user.id);
            if let Some(name) = &user.name {
                println!("Name:     {name}");
            }
            if let Some(email) = &user.email {
                let verified = match user.email_verified {
                    Some(true) => " (verified)",
                    Some(false) => " (not verified)",
                    None => "",
                };
                println!("Email:    {email}{verified}");
            }
            if let Some(phone) = &user.phone_number {
                println!("Phone:    {phone}");
            }
        }
        _ => println!("Not signed in."),
    }
    Ok(())
}

/// Confirm a sign-up with the emailed code.
pub async fn confirm_sign_up(storefront: &Storefront, username: &str, code: &str) -> Result<(), CliError> {
    if username.trim().is_empty() || code.trim().is_empty() {
        return Err(CliError::InvalidInput(
            "username and code are required".to_string(),
        ));
    }

    let message = storefront.confirm_sign_up(username, code).await?;
    println!("{message}");
    Ok(())
}
