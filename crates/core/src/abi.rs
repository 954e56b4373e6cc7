//! Contract ABI descriptor: method lookup and selectors.
//!
//! The application spec is compiled in; only the method table is used, to
//! turn a method name into the 4-byte selector that prefixes the call's
//! application arguments.

use serde::Deserialize;

use crate::account::sha512_256;
use crate::error::{ClaimError, Result};

/// ARC-32 application spec of the claim contract.
pub const APPLICATION_SPEC: &str = include_str!("../contract/application.arc32.json");

/// Prefix of the log entry carrying a method's return value.
pub const RETURN_LOG_PREFIX: [u8; 4] = [0x15, 0x1f, 0x7c, 0x75];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiArg {
    #[serde(rename = "type")]
    pub arg_type: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiReturns {
    #[serde(rename = "type")]
    pub return_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiMethod {
    pub name: String,
    #[serde(default)]
    pub args: Vec<AbiArg>,
    pub returns: AbiReturns,
    #[serde(default)]
    pub desc: Option<String>,
}

impl AbiMethod {
    /// `name(arg,types)return`
    pub fn signature(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(|a| a.arg_type.as_str()).collect();
        format!("{}({}){}", self.name, args.join(","), self.returns.return_type)
    }

    pub fn selector(&self) -> [u8; 4] {
        let digest = sha512_256(&[self.signature().as_bytes()]);
        [digest[0], digest[1], digest[2], digest[3]]
    }

    pub fn returns_void(&self) -> bool {
        self.returns.return_type == "void"
    }
}

/// Resolves a method name to its ABI description.
pub trait MethodResolver: Send + Sync {
    fn resolve_method(&self, name: &str) -> Result<AbiMethod>;
}

/// The `contract` section of an application spec.
#[derive(Debug, Clone, Deserialize)]
pub struct AbiContract {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<AbiMethod>,
}

#[derive(Deserialize)]
struct ApplicationSpec {
    contract: AbiContract,
}

impl AbiContract {
    /// Parse either a bare contract description or a full application spec.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ClaimError::Decode(e.to_string()))?;
        let parsed = if value.get("contract").is_some() {
            serde_json::from_value::<ApplicationSpec>(value).map(|spec| spec.contract)
        } else {
            serde_json::from_value::<AbiContract>(value)
        };
        parsed.map_err(|e| ClaimError::Decode(e.to_string()))
    }

    /// The compiled-in claim contract.
    pub fn builtin() -> Result<Self> {
        Self::from_json(APPLICATION_SPEC)
    }
}

impl MethodResolver for AbiContract {
    fn resolve_method(&self, name: &str) -> Result<AbiMethod> {
        let mut matches = self.methods.iter().filter(|m| m.name == name);
        let Some(first) = matches.next() else {
            return Err(ClaimError::MethodNotFound(name.to_string()));
        };
        let overloads = matches.count();
        if overloads > 0 {
            return Err(ClaimError::AmbiguousMethod {
                name: name.to_string(),
                count: overloads + 1,
            });
        }
        Ok(first.clone())
    }
}
