//! Synthesis scope: stack identity and target environment.
//!
//! Region and account are always passed in explicitly. Values left unset
//! render as pseudo parameters and are resolved by the provider at deploy
//! time.

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, SynthError};
use crate::domain::expr::Expr;

/// Target account and region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    /// Environment with neither account nor region fixed.
    pub fn agnostic() -> Self {
        Self::default()
    }

    pub fn new(account: Option<String>, region: Option<String>) -> Self {
        Self {
            account: account.filter(|s| !s.trim().is_empty()),
            region: region.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn account_expr(&self) -> Expr {
        match &self.account {
            Some(account) => Expr::lit(account.clone()),
            None => Expr::account(),
        }
    }

    pub fn region_expr(&self) -> Expr {
        match &self.region {
            Some(region) => Expr::lit(region.clone()),
            None => Expr::region(),
        }
    }

    /// `aws://<account>/<region>` with `unknown-*` placeholders.
    pub fn uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

/// Handle every synthesizer receives: which stack it builds and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackScope {
    stack_name: String,
    environment: Environment,
}

impl StackScope {
    /// Stack names start with a letter and contain only letters, digits and
    /// hyphens, up to 128 characters.
    pub fn new(stack_name: impl Into<String>, environment: Environment) -> Result<Self> {
        let stack_name = stack_name.into();
        let valid = stack_name.len() <= 128
            && stack_name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
            && stack_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(SynthError::InvalidStackName(stack_name));
        }
        Ok(Self {
            stack_name,
            environment,
        })
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agnostic_environment_uses_pseudo_parameters() {
        let env = Environment::agnostic();
        assert_eq!(env.region_expr().to_json(), json!({ "Ref": "AWS::Region" }));
        assert_eq!(
            env.account_expr().to_json(),
            json!({ "Ref": "AWS::AccountId" })
        );
        assert_eq!(env.uri(), "aws://unknown-account/unknown-region");
    }

    #[test]
    fn test_blank_values_are_unset() {
        let env = Environment::new(Some("  ".to_string()), Some("eu-west-1".to_string()));
        assert!(env.account.is_none());
        assert_eq!(env.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_stack_name_validation() {
        assert!(StackScope::new("BuildPipelineStack", Environment::agnostic()).is_ok());
        assert!(StackScope::new("train-stack-2", Environment::agnostic()).is_ok());
        assert!(StackScope::new("", Environment::agnostic()).is_err());
        assert!(StackScope::new("9lives", Environment::agnostic()).is_err());
        assert!(StackScope::new("has_underscore", Environment::agnostic()).is_err());
    }
}
