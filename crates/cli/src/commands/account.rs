//! Sign-in, sign-out and sign-up commands.

use std::path::PathBuf;

use redseam_storefront::ApiError;
use redseam_storefront::forms::{AvatarUpload, FormErrors, SignInForm, SignUpForm};
use secrecy::SecretString;

use super::Context;

/// Sign in and keep the token in the session.
pub async fn login(ctx: &Context, email: String, password: String) -> Result<(), ApiError> {
    let form = SignInForm {
        email,
        password: SecretString::from(password),
    };

    match ctx.auth().sign_in(&form).await {
        Ok(user) => {
            let name = user
                .and_then(|u| u.username.or(u.email))
                .unwrap_or_else(|| form.email.clone());
            println!("Signed in as {name}");
            Ok(())
        }
        Err(ApiError::Form(errors)) => {
            print_form_errors(&errors);
            Err(ApiError::Form(errors))
        }
        Err(e) => Err(e),
    }
}

/// Forget the stored session.
pub fn logout(ctx: &Context) {
    ctx.auth().sign_out();
    println!("Signed out");
}

/// Create an account.
pub async fn register(
    ctx: &Context,
    username: String,
    email: String,
    password: String,
    confirm_password: String,
    avatar: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let avatar = match avatar {
        Some(path) => Some(read_avatar(path).await?),
        None => None,
    };

    let form = SignUpForm {
        username,
        email,
        password: SecretString::from(password),
        confirm_password: SecretString::from(confirm_password),
        avatar,
    };

    match ctx.auth().sign_up(&form).await {
        Ok(()) => {
            println!("Registration successful! Sign in with `redseam login`.");
            Ok(())
        }
        Err(ApiError::Form(errors)) => {
            print_form_errors(&errors);
            Err(ApiError::Form(errors).into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn read_avatar(path: PathBuf) -> std::io::Result<AvatarUpload> {
    let bytes = tokio::fs::read(&path).await?;
    let file_name = path
        .file_name()
        .map_or_else(|| "avatar".to_string(), |n| n.to_string_lossy().into_owned());
    let mime_type = AvatarUpload::mime_for_file_name(&file_name)
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok(AvatarUpload {
        file_name,
        mime_type,
        bytes,
    })
}

pub fn print_form_errors(errors: &FormErrors) {
    for (field, message) in errors.iter() {
        println!("  {field}: {message}");
    }
}
