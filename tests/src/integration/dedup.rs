//! Proposal-level duplication scenarios.

use digest_engine::{DuplicationChecker, DuplicationError};
use shared_types::OperationFact;

use crate::fixtures::addr;

#[test]
fn test_proposal_with_colliding_senders_rejects_second_operation() {
    // One proposal: a Transfer and a RegisterCurrency both sending from A.
    let ops = vec![
        OperationFact::Transfer { sender: addr("addrA") },
        OperationFact::RegisterCurrency {
            sender: addr("addrA"),
            currency_id: "XCC".into(),
        },
    ];

    let mut checker = DuplicationChecker::new();
    let outcomes: Vec<Result<(), DuplicationError>> =
        ops.iter().map(|fact| checker.check(fact)).collect();

    assert!(outcomes[0].is_ok());
    let err = outcomes[1].as_ref().unwrap_err();
    assert!(matches!(err, DuplicationError::Sender(_)));
    assert!(format!("{err}").contains("addrA"));
}

#[test]
fn test_proposal_with_distinct_senders_is_accepted() {
    let ops = vec![
        OperationFact::Transfer { sender: addr("addrA") },
        OperationFact::RegisterCurrency {
            sender: addr("addrB"),
            currency_id: "XCC".into(),
        },
    ];

    let mut checker = DuplicationChecker::new();
    for fact in &ops {
        checker.check(fact).unwrap();
    }
}

#[test]
fn test_checker_is_scoped_to_one_proposal() {
    let mut first = DuplicationChecker::new();
    first
        .check(&OperationFact::Transfer { sender: addr("addrA") })
        .unwrap();

    // A fresh proposal starts with a fresh claim set.
    let mut second = DuplicationChecker::new();
    second
        .check(&OperationFact::Transfer { sender: addr("addrA") })
        .unwrap();
}
