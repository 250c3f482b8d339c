//! Peer-identity requirement attached to a server.
//!
//! The requirement is chosen by the host, stored by the server, and handed to
//! the connection activator alongside every connection.  The acceptance core
//! never evaluates it: deciding whether a peer satisfies the requirement is
//! the activator's job.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which peers a server is willing to serve.
///
/// In TOML the unit variants are written as plain strings and the signing
/// variant as an inline table:
///
/// ```toml
/// client_requirement = "same-user"
/// client_requirement = { code-signing = "identifier \"com.example.helper\"" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ClientRequirement {
    /// Any peer holding a descriptor may be served.
    Unrestricted,
    /// Only peers running inside this process.
    SameProcess,
    /// Only peers running as the same OS user.
    #[default]
    SameUser,
    /// Only peers whose code signature satisfies the given requirement text.
    CodeSigning(String),
}

impl fmt::Display for ClientRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRequirement::Unrestricted => f.write_str("unrestricted"),
            ClientRequirement::SameProcess => f.write_str("same-process"),
            ClientRequirement::SameUser => f.write_str("same-user"),
            ClientRequirement::CodeSigning(text) => write!(f, "code-signing({text})"),
        }
    }
}
