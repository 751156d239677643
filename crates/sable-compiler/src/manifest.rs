//! Contract manifest
//!
//! The manifest describes the exported interface of a compiled contract and
//! the calls it is allowed to make. Field order follows the serialized layout.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Wildcard marker for contracts and method sets
pub const WILDCARD: &str = "*";

/// Semantic type of a parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    /// Any value
    Any,
    /// Boolean
    Boolean,
    /// Arbitrary precision integer
    Integer,
    /// Byte string
    ByteArray,
    /// UTF-8 string
    String,
    /// 20-byte script hash
    Hash160,
    /// 32-byte hash
    Hash256,
    /// Compressed public key
    PublicKey,
    /// Signature
    Signature,
    /// Array
    Array,
    /// Map
    Map,
    /// Opaque interop handle
    InteropInterface,
    /// No value
    Void,
}

/// Named, typed parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    #[serde(rename = "type")]
    pub kind: ParameterType,
}

impl Parameter {
    /// Create a parameter
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Exported method entry of the ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiMethod {
    /// Exported name
    pub name: String,
    /// Offset of the method's first instruction in the script
    pub offset: u32,
    /// Whether the method only reads state
    pub safe: bool,
    /// Return type
    #[serde(rename = "returntype")]
    pub return_type: ParameterType,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
}

/// Event entry of the ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEvent {
    /// Event name
    pub name: String,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
}

/// Methods and events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAbi {
    /// Exported methods
    pub methods: Vec<AbiMethod>,
    /// Declared events
    pub events: Vec<AbiEvent>,
}

/// Signing group the contract belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractGroup {
    /// Group public key
    pub pubkey: String,
    /// Signature over the contract hash
    pub signature: String,
}

/// Methods a permission covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWildcardList", into = "RawWildcardList")]
pub enum MethodSet {
    /// Every method
    Wildcard,
    /// Listed methods, in first-seen order
    List(Vec<String>),
}

impl MethodSet {
    /// Whether `method` is covered
    pub fn allows(&self, method: &str) -> bool {
        match self {
            MethodSet::Wildcard => true,
            MethodSet::List(methods) => methods.iter().any(|m| m == method),
        }
    }

    fn insert(&mut self, method: &str) {
        if method == WILDCARD {
            *self = MethodSet::Wildcard;
            return;
        }
        if let MethodSet::List(methods) = self
            && !methods.iter().any(|m| m == method)
        {
            methods.push(method.to_string());
        }
    }
}

/// `"*"` or a list of strings, as written in the manifest
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawWildcardList {
    One(String),
    Many(Vec<String>),
}

impl RawWildcardList {
    fn parse(self, what: &str) -> Result<Option<Vec<String>>, String> {
        match self {
            RawWildcardList::One(s) if s == WILDCARD => Ok(None),
            RawWildcardList::One(s) => Err(format!("expected \"*\" or a list of {what}, got \"{s}\"")),
            RawWildcardList::Many(items) => Ok(Some(items)),
        }
    }

    fn from_items(items: Option<Vec<String>>) -> Self {
        match items {
            None => RawWildcardList::One(WILDCARD.to_string()),
            Some(items) => RawWildcardList::Many(items),
        }
    }
}

impl TryFrom<RawWildcardList> for MethodSet {
    type Error = String;

    fn try_from(raw: RawWildcardList) -> Result<Self, Self::Error> {
        Ok(raw.parse("methods")?.map_or(MethodSet::Wildcard, MethodSet::List))
    }
}

impl From<MethodSet> for RawWildcardList {
    fn from(set: MethodSet) -> Self {
        match set {
            MethodSet::Wildcard => RawWildcardList::from_items(None),
            MethodSet::List(methods) => RawWildcardList::from_items(Some(methods)),
        }
    }
}

/// Contracts trusted to call this one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWildcardList", into = "RawWildcardList")]
pub enum TrustSet {
    /// Every contract
    Wildcard,
    /// Listed contract hashes or group keys
    List(Vec<String>),
}

impl Default for TrustSet {
    fn default() -> Self {
        TrustSet::List(Vec::new())
    }
}

impl TryFrom<RawWildcardList> for TrustSet {
    type Error = String;

    fn try_from(raw: RawWildcardList) -> Result<Self, Self::Error> {
        Ok(raw.parse("contracts")?.map_or(TrustSet::Wildcard, TrustSet::List))
    }
}

impl From<TrustSet> for RawWildcardList {
    fn from(set: TrustSet) -> Self {
        match set {
            TrustSet::Wildcard => RawWildcardList::from_items(None),
            TrustSet::List(contracts) => RawWildcardList::from_items(Some(contracts)),
        }
    }
}

/// Contract the compiled contract may call, and which of its methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Callee hash, group key or `*`
    pub contract: String,
    /// Callable methods
    pub methods: MethodSet,
}

/// Accumulates permissions, merging entries for the same contract
#[derive(Debug, Clone, Default)]
pub struct PermissionBuilder {
    entries: IndexMap<String, MethodSet>,
}

impl PermissionBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow calling `method` on `contract`; `*` allows every method
    pub fn add(&mut self, contract: impl Into<String>, method: &str) {
        self.entries
            .entry(contract.into())
            .or_insert_with(|| MethodSet::List(Vec::new()))
            .insert(method);
    }

    /// Allow calling each of `methods` on `contract`
    pub fn add_all<'m>(&mut self, contract: impl Into<String>, methods: impl IntoIterator<Item = &'m str>) {
        let set = self
            .entries
            .entry(contract.into())
            .or_insert_with(|| MethodSet::List(Vec::new()));
        for method in methods {
            set.insert(method);
        }
    }

    /// Whether nothing was added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Permissions in first-seen contract order
    pub fn build(&self) -> Vec<Permission> {
        self.entries
            .iter()
            .map(|(contract, methods)| Permission {
                contract: contract.clone(),
                methods: methods.clone(),
            })
            .collect()
    }
}

/// Contract manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Contract name
    pub name: String,
    /// Signing groups
    pub groups: Vec<ContractGroup>,
    /// Implemented standards, e.g. `NEP-17`
    #[serde(rename = "supportedstandards")]
    pub supported_standards: Vec<String>,
    /// Methods and events
    pub abi: ContractAbi,
    /// Allowed outgoing calls
    pub permissions: Vec<Permission>,
    /// Contracts trusted to call this one
    pub trusts: TrustSet,
    /// Vendor metadata; `null` reads as empty
    #[serde(deserialize_with = "null_as_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<serde_json::Map<String, serde_json::Value>, D::Error> {
    let extra: Option<serde_json::Map<String, serde_json::Value>> =
        Option::deserialize(deserializer)?;
    Ok(extra.unwrap_or_default())
}

impl Manifest {
    /// Find an exported method by name
    pub fn method(&self, name: &str) -> Option<&AbiMethod> {
        self.abi.methods.iter().find(|m| m.name == name)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permission_merge() {
        let mut builder = PermissionBuilder::new();
        builder.add("0xaa", "transfer");
        builder.add("0xbb", "balanceOf");
        builder.add("0xaa", "symbol");
        builder.add("0xaa", "transfer");
        let permissions = builder.build();
        assert_eq!(permissions.len(), 2);
        assert_eq!(permissions[0].contract, "0xaa");
        assert_eq!(
            permissions[0].methods,
            MethodSet::List(vec!["transfer".into(), "symbol".into()])
        );

        builder.add("0xaa", WILDCARD);
        builder.add("0xaa", "decimals");
        assert_eq!(builder.build()[0].methods, MethodSet::Wildcard);
    }

    #[test]
    fn test_manifest_layout() {
        let mut permissions = PermissionBuilder::new();
        permissions.add_all(WILDCARD, [WILDCARD]);
        let manifest = Manifest {
            name: "Token".into(),
            groups: vec![],
            supported_standards: vec!["NEP-17".into()],
            abi: ContractAbi {
                methods: vec![AbiMethod {
                    name: "balanceOf".into(),
                    offset: 7,
                    safe: true,
                    return_type: ParameterType::Integer,
                    parameters: vec![Parameter::new("account", ParameterType::Hash160)],
                }],
                events: vec![AbiEvent {
                    name: "Transfer".into(),
                    parameters: vec![Parameter::new("amount", ParameterType::Integer)],
                }],
            },
            permissions: permissions.build(),
            trusts: TrustSet::default(),
            extra: serde_json::Map::new(),
        };

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Token",
                "groups": [],
                "supportedstandards": ["NEP-17"],
                "abi": {
                    "methods": [{
                        "name": "balanceOf",
                        "offset": 7,
                        "safe": true,
                        "returntype": "Integer",
                        "parameters": [{"name": "account", "type": "Hash160"}]
                    }],
                    "events": [{
                        "name": "Transfer",
                        "parameters": [{"name": "amount", "type": "Integer"}]
                    }]
                },
                "permissions": [{"contract": "*", "methods": "*"}],
                "trusts": [],
                "extra": {}
            })
        );

        let text = manifest.to_json().unwrap();
        assert!(text.find("\"name\"").unwrap() < text.find("\"groups\"").unwrap());
        assert_eq!(Manifest::from_json(&text).unwrap(), manifest);
    }

    #[test]
    fn test_bad_method_set() {
        let err = serde_json::from_value::<Permission>(json!({"contract": "*", "methods": "all"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_wildcard_trusts_and_null_extra() {
        let value = json!({
            "name": "Wallet",
            "groups": [],
            "supportedstandards": [],
            "abi": {"methods": [], "events": []},
            "permissions": [],
            "trusts": "*",
            "extra": null
        });
        let manifest: Manifest = serde_json::from_value(value).unwrap();
        assert_eq!(manifest.trusts, TrustSet::Wildcard);
        assert!(manifest.extra.is_empty());

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["trusts"], "*");
        assert_eq!(value["extra"], json!({}));

        let listed: TrustSet = serde_json::from_value(json!(["0xaa"])).unwrap();
        assert_eq!(listed, TrustSet::List(vec!["0xaa".into()]));
        assert!(serde_json::from_value::<TrustSet>(json!("nobody")).is_err());
    }
}
