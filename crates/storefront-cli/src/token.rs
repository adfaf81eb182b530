//! # Token Subcommand
//!
//! Prints a bearer token in the format the API's auth middleware accepts:
//! `{role}:{user_id}:{mac}`. The secret itself never appears in the output,
//! so customer tokens can be handed out.

use anyhow::{anyhow, Result};
use clap::{Args, ValueEnum};
use uuid::Uuid;

use storefront_api::auth::{mint_token, Role};

/// Arguments for `storefront token`.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Role carried by the token.
    #[arg(long, value_enum)]
    pub role: TokenRole,

    /// User the token is bound to. Required for customers.
    #[arg(long)]
    pub user_id: Option<Uuid>,

    /// Shared secret configured on the API (`AUTH_TOKEN`).
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    pub secret: String,
}

/// Roles a token can be minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TokenRole {
    Customer,
    Staff,
}

impl From<TokenRole> for Role {
    fn from(role: TokenRole) -> Self {
        match role {
            TokenRole::Customer => Role::Customer,
            TokenRole::Staff => Role::Staff,
        }
    }
}

/// Build the token string without printing it.
pub fn build_token(args: &TokenArgs) -> Result<String> {
    if args.secret.trim().is_empty() {
        return Err(anyhow!("secret must not be empty"));
    }
    mint_token(args.role.into(), args.user_id, &args.secret).map_err(|e| anyhow!(e))
}

/// Execute the token subcommand.
pub fn run_token(args: &TokenArgs) -> Result<u8> {
    let token = build_token(args)?;
    println!("{token}");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_api::auth::parse_bearer_token;

    fn args(role: TokenRole, user_id: Option<Uuid>) -> TokenArgs {
        TokenArgs {
            role,
            user_id,
            secret: "s3cret".into(),
        }
    }

    #[test]
    fn customer_token_is_accepted_by_the_api() {
        let user = Uuid::new_v4();
        let token = build_token(&args(TokenRole::Customer, Some(user))).unwrap();
        assert!(token.starts_with(&format!("customer:{user}:")));
        assert!(!token.contains("s3cret"));

        let identity = parse_bearer_token(&token, "s3cret").unwrap();
        assert_eq!(identity.role, Role::Customer);
        assert_eq!(identity.user_id, Some(user));
    }

    #[test]
    fn staff_token_may_omit_user() {
        let token = build_token(&args(TokenRole::Staff, None)).unwrap();
        assert!(token.starts_with("staff::"));
        let identity = parse_bearer_token(&token, "s3cret").unwrap();
        assert_eq!(identity.role, Role::Staff);
        assert!(identity.user_id.is_none());
    }

    #[test]
    fn customer_without_user_is_rejected() {
        assert!(build_token(&args(TokenRole::Customer, None)).is_err());
    }

    #[test]
    fn blank_secret_is_rejected() {
        let mut a = args(TokenRole::Staff, None);
        a.secret = "  ".into();
        assert!(build_token(&a).is_err());
    }
}
