// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::InvocationError;
use serde::Deserialize;

/// How the test command reaches the environment it runs in.
///
/// Projects that run PHP inside a container or on a remote host configure a wrapper such as
/// `docker compose exec -T app`; the test command is passed to the wrapper as a single
/// `sh -c` argument.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TransportConfig {
    #[serde(default)]
    wrapper: Option<String>,
}

impl TransportConfig {
    /// Creates a transport configuration with the given wrapper.
    pub fn with_wrapper(wrapper: impl Into<String>) -> Self {
        Self {
            wrapper: Some(wrapper.into()),
        }
    }

    /// Returns the wrapper string, if one is configured.
    pub fn wrapper(&self) -> Option<&str> {
        self.wrapper.as_deref().filter(|wrapper| !wrapper.trim().is_empty())
    }

    /// Splits the wrapper into arguments using shell quoting rules.
    ///
    /// Returns an empty list if no wrapper is configured.
    pub fn wrapper_args(&self) -> Result<Vec<String>, InvocationError> {
        let Some(wrapper) = self.wrapper() else {
            return Ok(Vec::new());
        };
        let args = shell_words::split(wrapper).map_err(|error| InvocationError::WrapperParse {
            wrapper: wrapper.to_owned(),
            error,
        })?;
        if args.is_empty() {
            return Err(InvocationError::EmptyWrapper);
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_quoted_wrapper() {
        let transport = TransportConfig::with_wrapper(r#"ssh -o "ProxyJump bastion" ci"#);
        assert_eq!(
            transport.wrapper_args().unwrap(),
            vec!["ssh", "-o", "ProxyJump bastion", "ci"]
        );
    }

    #[test]
    fn blank_wrapper_is_no_wrapper() {
        let transport = TransportConfig::with_wrapper("  ");
        assert_eq!(transport.wrapper(), None);
        assert!(transport.wrapper_args().unwrap().is_empty());
    }

    #[test]
    fn unbalanced_quotes_are_an_error() {
        let transport = TransportConfig::with_wrapper("docker exec 'app");
        assert!(matches!(
            transport.wrapper_args(),
            Err(InvocationError::WrapperParse { .. })
        ));
    }
}
