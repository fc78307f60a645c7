//! Currency domain: accounts, balances, currency designs and contract
//! accounts.
//!
//! Key shapes:
//! - account           `<address>:account`
//! - contract account  `<address>:contractaccount`
//! - balance           `<address>:<currency>:balance`
//! - currency design   `currency:<currency_id>:design`
//!
//! Balances keep their full history; the "current balance per currency" is
//! answered by a height-descending query, not by compaction.

use digest_store::{
    Document, DocumentStore, Filter, IndexDirection, IndexRegistry, IndexSpec, OpContext,
    StoreError,
};
use serde::{Deserialize, Serialize};
use shared_types::{Address, State, StateKey};

use crate::domains::{BlockRef, DomainHandler, StateProjection};
use crate::error::EngineError;
use crate::keys::{has_prefix, has_suffix, parse_state_key, parse_suffixed_key, part_count};
use crate::queries;

pub const COL_CURRENCY: &str = "digest_currency";
pub const COL_ACCOUNT: &str = "digest_account";
pub const COL_CONTRACT_ACCOUNT: &str = "digest_contract_account";
pub const COL_BALANCE: &str = "digest_balance";

const CURRENCY_PREFIX: &str = "currency";

/// Typed payload of an account state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountValue {
    pub address: Address,
    /// Signing keys, kept opaque.
    pub keys: serde_json::Value,
}

/// Typed payload of a balance state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceValue {
    pub currency: String,
    pub amount: String,
}

/// Typed payload of a currency design state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyDesignValue {
    pub currency_id: String,
    pub total_supply: String,
    /// Fee and minting policy, kept opaque.
    pub policy: serde_json::Value,
}

/// Typed payload of a contract account status state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractAccountValue {
    pub owner: Address,
    pub is_active: bool,
}

pub fn is_account_state_key(key: &StateKey) -> bool {
    part_count(key) == 2 && has_suffix(key, "account")
}

pub fn is_contract_account_state_key(key: &StateKey) -> bool {
    part_count(key) == 2 && has_suffix(key, "contractaccount")
}

pub fn is_balance_state_key(key: &StateKey) -> bool {
    part_count(key) == 3 && has_suffix(key, "balance")
}

pub fn is_currency_design_state_key(key: &StateKey) -> bool {
    part_count(key) == 3 && has_prefix(key, CURRENCY_PREFIX) && has_suffix(key, "design")
}

fn decode<T: serde::de::DeserializeOwned>(state: &State) -> Result<T, EngineError> {
    serde_json::from_value(state.value.clone()).map_err(|e| EngineError::MalformedValue {
        key: state.key.as_str().to_string(),
        detail: e.to_string(),
    })
}

/// Account document: payload plus denormalized address.
pub fn account_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_suffixed_key(&state.key, "account", 2)?;
    let _value: AccountValue = decode(state)?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("address", tokens[0]);
    Ok(doc)
}

pub fn contract_account_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_suffixed_key(&state.key, "contractaccount", 2)?;
    let _value: ContractAccountValue = decode(state)?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("address", tokens[0]);
    Ok(doc)
}

pub fn balance_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_suffixed_key(&state.key, "balance", 3)?;
    let value: BalanceValue = decode(state)?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("address", tokens[0]);
    doc.set("currency", value.currency.as_str());
    Ok(doc)
}

pub fn currency_design_doc(state: &State) -> Result<Document, EngineError> {
    let tokens = parse_state_key(&state.key, CURRENCY_PREFIX, 3)?;
    let _value: CurrencyDesignValue = decode(state)?;
    let mut doc = Document::with_payload(state.value.clone(), state.height);
    doc.set("currency", tokens[1]);
    Ok(doc)
}

/// Latest account document for an address.
pub async fn account_by_address(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    address: &Address,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_ACCOUNT,
        Filter::new().eq("address", address.as_str()),
    )
    .await
}

/// Latest balance document per currency id for an address.
pub async fn balances_by_address(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    address: &Address,
) -> Result<Vec<Document>, StoreError> {
    let rows = store
        .find(
            ctx,
            COL_BALANCE,
            &digest_store::Query::new(Filter::new().eq("address", address.as_str()))
                .sort(digest_store::SortOrder::Descending),
        )
        .await?;

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        let currency = row.str_field("currency").unwrap_or_default().to_string();
        if seen.insert(currency) {
            out.push(row);
        }
    }
    Ok(out)
}

/// Latest currency design document.
pub async fn currency_design(
    store: &dyn DocumentStore,
    ctx: &OpContext,
    currency_id: &str,
) -> Result<Option<Document>, StoreError> {
    queries::latest(
        store,
        ctx,
        COL_CURRENCY,
        Filter::new().eq("currency", currency_id),
    )
    .await
}

pub struct CurrencyHandler;

impl DomainHandler for CurrencyHandler {
    fn name(&self) -> &'static str {
        "currency"
    }

    fn matches(&self, key: &StateKey) -> bool {
        is_currency_design_state_key(key)
            || is_account_state_key(key)
            || is_contract_account_state_key(key)
            || is_balance_state_key(key)
    }

    fn project(&self, state: &State, _block: &BlockRef<'_>) -> Result<StateProjection, EngineError> {
        if is_currency_design_state_key(&state.key) {
            Ok(StateProjection::insert(COL_CURRENCY, currency_design_doc(state)?))
        } else if is_account_state_key(&state.key) {
            Ok(StateProjection::insert(COL_ACCOUNT, account_doc(state)?))
        } else if is_contract_account_state_key(&state.key) {
            Ok(StateProjection::insert(
                COL_CONTRACT_ACCOUNT,
                contract_account_doc(state)?,
            ))
        } else {
            Ok(StateProjection::insert(COL_BALANCE, balance_doc(state)?))
        }
    }

    fn collections(&self) -> &'static [&'static str] {
        &[COL_CURRENCY, COL_ACCOUNT, COL_CONTRACT_ACCOUNT, COL_BALANCE]
    }

    fn register_indexes(&self, registry: &mut IndexRegistry) {
        registry.register(
            COL_ACCOUNT,
            vec![
                IndexSpec::new(
                    "account",
                    &[
                        ("address", IndexDirection::Ascending),
                        ("height", IndexDirection::Descending),
                    ],
                ),
                IndexSpec::new("account_height", &[("height", IndexDirection::Descending)]),
            ],
        );
        registry.register(
            COL_CONTRACT_ACCOUNT,
            vec![IndexSpec::new(
                "contract_account",
                &[
                    ("address", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
        registry.register(
            COL_BALANCE,
            vec![
                IndexSpec::new(
                    "balance",
                    &[
                        ("address", IndexDirection::Ascending),
                        ("height", IndexDirection::Descending),
                    ],
                ),
                IndexSpec::new(
                    "balance_currency",
                    &[
                        ("address", IndexDirection::Ascending),
                        ("currency", IndexDirection::Ascending),
                        ("height", IndexDirection::Descending),
                    ],
                ),
                IndexSpec::new("balance_height", &[("height", IndexDirection::Descending)]),
            ],
        );
        registry.register(
            COL_CURRENCY,
            vec![IndexSpec::new(
                "currency",
                &[
                    ("currency", IndexDirection::Ascending),
                    ("height", IndexDirection::Descending),
                ],
            )],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::Height;

    fn balance_state(address: &str, currency: &str, amount: &str, height: u64) -> State {
        State {
            key: StateKey::new(format!("{address}:{currency}:balance")),
            height: Height::new(height),
            value: json!({"currency": currency, "amount": amount}),
            operations: vec![shared_types::Hash::new([1; 32])],
        }
    }

    #[test]
    fn test_balance_doc_round_trip() {
        let state = balance_state("addr0001", "PEN", "1000", 5);
        let doc = balance_doc(&state).unwrap();
        assert_eq!(doc.str_field("address"), Some("addr0001"));
        assert_eq!(doc.str_field("currency"), Some("PEN"));
        assert_eq!(doc.height(), Some(Height::new(5)));
    }

    #[test]
    fn test_balance_doc_is_pure() {
        let state = balance_state("addr0001", "PEN", "1000", 5);
        assert_eq!(balance_doc(&state).unwrap(), balance_doc(&state).unwrap());
    }

    #[test]
    fn test_malformed_balance_value() {
        let mut state = balance_state("addr0001", "PEN", "1000", 5);
        state.value = json!({"amount": "1000"});
        assert!(matches!(
            balance_doc(&state),
            Err(EngineError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_currency_key_requires_prefix() {
        assert!(is_currency_design_state_key(&StateKey::new(
            "currency:PEN:design"
        )));
        assert!(!is_currency_design_state_key(&StateKey::new(
            "storage:PEN:design"
        )));
    }

    #[tokio::test]
    async fn test_balances_by_address_latest_per_currency() {
        use digest_store::{DocumentStore, MemoryStore};

        let store = MemoryStore::new();
        let ctx = OpContext::background();
        let mut txn = store.begin(&ctx).await.unwrap();
        let docs = vec![
            balance_doc(&balance_state("addr0001", "PEN", "10", 1)).unwrap(),
            balance_doc(&balance_state("addr0001", "PEN", "20", 2)).unwrap(),
            balance_doc(&balance_state("addr0001", "EUR", "5", 1)).unwrap(),
        ];
        txn.insert_many(&ctx, COL_BALANCE, docs).await.unwrap();
        txn.commit(&ctx).await.unwrap();

        let balances = balances_by_address(&store, &ctx, &Address::parse("addr0001").unwrap())
            .await
            .unwrap();
        assert_eq!(balances.len(), 2);
        let pen = balances
            .iter()
            .find(|d| d.str_field("currency") == Some("PEN"))
            .unwrap();
        assert_eq!(pen.height(), Some(Height::new(2)));
    }
}
