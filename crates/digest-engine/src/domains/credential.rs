//! Credential domain: issuing services, templates, credentials and holder
//! registrations.
//!
//! Key shapes:
//! - service design  `credential:<contract>:design`
//! - template        `credential:<contract>:<template_id>:template`
//! - credential      `credential:<contract>:<template_id>:<credential_id>:credential`
//! - holder          `credential:<contract>:<holder>:holder`
//!
//! Credentials are mutable logical keys (issue then revoke): superseded
//! rows sharing (contract, template, credential_id) are condemned by a
//! compaction inside the committing transaction.

use digest_store::{
    Document, DocumentStore, Filter, IndexDirection, IndexRegistry, IndexSpec, OpContext,
    StoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{State, StateKey};

use crate::domains::{BlockRef, Compaction, DomainHandler, StateProjection};
use crate::error::EngineError;
use crate::keys::{has_prefix, has_suffix, parse_state_key, part_count};
use crate::queries;

pub const COL_CREDENTIAL_SERVICE: &str = "digest_credential_service";
pub const COL_TEMPLATE: &str = "digest_template";
pub const COL_CREDENTIAL: &str = "digest_credential";
pub const COL_HOLDER: &str = "digest_holder";

pub const CREDENTIAL_PREFIX: &str = "credential";

/// Typed payload of a credential service design state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialServiceValue {
    pub templates: Vec<String>,
}

/// Typed payload of a template state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateValue {
    pub template_id: String,
    pub template_name: String,
    pub creator: String,
}

/// Typed payload of a credential state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialValue {
    pub holder: String,
    pub template_id: String,
    pub credential_id: String,
    pub value: String,
    pub valid_from: u64,
    pub valid_until: u64,
    pub did: String,
}

/// Typed payload of a holder registration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderValue {
    pub holder: String,
    pub did: String,
}

pub fn is_design_state_key(key: &StateKey) -> bool {
    part_count(key) == 3 && has_prefix(key, CREDENTIAL_PREFIX) && has_suffix(key, "design")
}

pub fn is_template_state_key(key: &StateKey) -> bool {
    part_count(key) == 4 && has_prefix(key, CREDENTIAL_PREFIX) && has_suffix(key, "template")
}

pub fn is_credential_state_key(key: &StateKey) -> bool {
    part_count(key) == 5 && has_prefix(key, CREDENTIAL_PREFIX) && has_suffix(key, "credential")
}

pub fn is_holder_state_key(key: &StateKey) -> bool {
    part_count(key) == 4 && has_prefix(key, CREDENTIAL_PREFIX) && has_suffix(key, "holder")
}

fn decode<T: serde::de::DeserializeOwned>(state: &State) -> Result<T, EngineError> {
    serde_json::from_value(state.value.clone()).map_err(|e| EngineError::MalformedValue {
        key: state.key.as_str().to_string(),
        detail: e.to_string(),
    })
}

pub fn service_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, CREDENTIAL_PREFIX, 3)?;
    let _value: CredentialServiceValue = decode(state)?;
    let payload = serde_json::to_value(state).map_err(|e| EngineError::MalformedValue {
        key: state.key.as_str().to_string(),
        detail: e.to_string(),
    })?;
    let mut doc = Document::with_payload(payload, state.height);
    doc.set("contract", tokens[1]);
    Ok(doc)
}

pub fn template_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, CREDENTIAL_PREFIX, 4)?;
    let _value: TemplateValue = decode(state)?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("contract", tokens[1]);
    doc.set("template", tokens[2]);
    Ok(doc)
}

pub fn credential_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, CREDENTIAL_PREFIX, 5)?;
    let value: CredentialValue = decode(state)?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("contract", tokens[1]);
    doc.set("template", tokens[2]);
    doc.set("credential_id", tokens[3]);
    doc.set("holder", value.holder.as_str());
    Ok(doc)
}

pub fn holder_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, CREDENTIAL_PREFIX, 4)?;
    let _value: HolderValue = decode(state)?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("contract", tokens[1]);
    doc.set("holder", tokens[2]);
    Ok(doc)
}

/// Latest credential service design for a contract.
pub async fn credential_service(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_CREDENTIAL_SERVICE,
        Filter::new().eq("contract", contract),
    )
    .await
}

/// Latest template document for (contract, template_id).
pub async fn template(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    template_id: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_TEMPLATE,
        Filter::new().eq("contract", contract).eq("template", template_id),
    )
    .await
}

/// Latest credential row for (contract, template_id, credential_id).
pub async fn credential(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    template_id: &str,
    credential_id: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_CREDENTIAL,
        Filter::new()
            .eq("contract", contract)
            .eq("template", template_id)
            .eq("credential_id", credential_id),
    )
    .await
}

/// Height-paginated credentials under (contract, template_id).
pub async fn credentials_by_template(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    template_id: &str,
    offset: Option<u64>,
    reverse: bool,
    limit: u64,
) -> Result<Vec<Document>, StoreError> {
    queries::history(
        store,
        ctx,
        COL_CREDENTIAL,
        Filter::new().eq("contract", contract).eq("template", template_id),
        offset,
        reverse,
        limit,
    )
    .await
}

/// Latest holder registration for (contract, holder).
pub async fn holder(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    holder: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_HOLDER,
        Filter::new().eq("contract", contract).eq("holder", holder),
    )
    .await
}

/// Credentials held by one holder under a contract, height-descending.
pub async fn credentials_by_holder(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    contract: &str,
    holder: &str,
    limit: u64,
) -> Result<Vec<Document>, StoreError> {
    queries::history(
        store,
        ctx,
        COL_CREDENTIAL,
        Filter::new().eq("contract", contract).eq("holder", holder),
        None,
        true,
        limit,
    )
    .await
}

pub struct CredentialHandler;

impl DomainHandler for CredentialHandler {
    fn name(&self) -> &'static str {
        "credential"
    }

    fn matches(&self, key: &StateKey) -> bool {
        has_prefix(key, CREDENTIAL_PREFIX)
    }

    fn project(&self, state: &State, _block: &BlockRef<'_>) -> Result<StateProjection, EngineError> {
        if is_design_state_key(&state.key) {
            Ok(StateProjection::insert(COL_CREDENTIAL_SERVICE, service_doc(state)?))
        } else if is_template_state_key(&state.key) {
            Ok(StateProjection::insert(COL_TEMPLATE, template_doc(state)?))
        } else if is_credential_state_key(&state.key) {
            let tokens = parse_state_key(&state.key, CREDENTIAL_PREFIX, 5)?;
            let compaction = Compaction {
                collection: COL_CREDENTIAL,
                filter: vec![
                    ("contract", Value::from(tokens[1])),
                    ("template", Value::from(tokens[2])),
                    ("credential_id", Value::from(tokens[3])),
                ],
            };
            Ok(StateProjection::insert(COL_CREDENTIAL, credential_doc(state)?)
                .with_compaction(compaction))
        } else if is_holder_state_key(&state.key) {
            Ok(StateProjection::insert(COL_HOLDER, holder_doc(state)?))
        } else {
            Err(EngineError::KeyShape {
                key: state.key.as_str().to_string(),
                expected: 3,
                found: part_count(&state.key),
            })
        }
    }

    fn collections(&self) -> &'static [&'static str] {
        &[COL_CREDENTIAL_SERVICE, COL_CREDENTIAL, COL_HOLDER, COL_TEMPLATE]
    }

    fn register_indexes(&self, registry: &mut IndexRegistry) {
        registry.register(
            COL_CREDENTIAL_SERVICE,
            vec![IndexSpec::new(
                "credential_service_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
        registry.register(
            COL_CREDENTIAL,
            vec![IndexSpec::new(
                "credential_id_contract_template_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("template", IndexDirection::Ascending),
                    ("credential_id", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
        registry.register(
            COL_HOLDER,
            vec![IndexSpec::new(
                "credential_holder_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("holder", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
        registry.register(
            COL_TEMPLATE,
            vec![IndexSpec::new(
                "credential_template_contract_height",
                &[
                    ("contract", IndexDirection::Ascending),
                    ("template", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
    }
}
