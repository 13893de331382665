//! Unit and property tests for the disjunctive evaluator

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::check::{from_fn, predicate};
    use crate::error::CheckError;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Request {
        user: &'static str,
        owner: &'static str,
        admins: HashSet<&'static str>,
    }

    impl Request {
        fn new(user: &'static str, owner: &'static str) -> Self {
            Self {
                user,
                owner,
                admins: HashSet::new(),
            }
        }

        fn with_admin(mut self, admin: &'static str) -> Self {
            self.admins.insert(admin);
            self
        }
    }

    type Checks = Vec<Arc<dyn Check<Request>>>;

    fn is_owner() -> Arc<dyn Check<Request>> {
        Arc::new(predicate("is_owner", |req: &Request, _: Option<&()>| {
            req.user == req.owner
        }))
    }

    fn is_admin() -> Arc<dyn Check<Request>> {
        Arc::new(predicate("is_admin", |req: &Request, _: Option<&()>| {
            req.admins.contains(req.user)
        }))
    }

    fn constant(
        name: &'static str,
        answer: bool,
        calls: Arc<AtomicUsize>,
    ) -> Arc<dyn Check<Request>> {
        Arc::new(predicate(name, move |_: &Request, _: Option<&()>| {
            calls.fetch_add(1, Ordering::SeqCst);
            answer
        }))
    }

    fn exploding(calls: Arc<AtomicUsize>) -> Arc<dyn Check<Request>> {
        Arc::new(from_fn("exploding", move |_: &Request, _: Option<&()>| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CheckError::failed("exploding", "boom"))
        }))
    }

    #[test]
    fn test_owner_is_allowed() {
        let checks: Checks = vec![is_owner(), is_admin()];
        let req = Request::new("alice", "alice");

        let verdict = evaluate_verdict(&checks, &req, None).unwrap();
        assert_eq!(verdict.decision, Decision::Allow);
        assert_eq!(verdict.granted_by.as_deref(), Some("is_owner"));
        assert_eq!(verdict.evaluated, 1);
    }

    #[test]
    fn test_admin_is_allowed_when_not_owner() {
        let checks: Checks = vec![is_owner(), is_admin()];
        let req = Request::new("bob", "alice").with_admin("bob");

        let verdict = evaluate_verdict(&checks, &req, None).unwrap();
        assert_eq!(verdict.decision, Decision::Allow);
        assert_eq!(verdict.granted_by.as_deref(), Some("is_admin"));
        assert_eq!(verdict.evaluated, 2);
    }

    #[test]
    fn test_stranger_is_denied() {
        let checks: Checks = vec![is_owner(), is_admin()];
        let req = Request::new("bob", "alice").with_admin("carol");

        let verdict = evaluate_verdict(&checks, &req, None).unwrap();
        assert_eq!(verdict.decision, Decision::Deny);
        assert_eq!(verdict.granted_by, None);
        assert_eq!(verdict.evaluated, 2);
    }

    #[test]
    fn test_empty_list_denies() {
        let checks: Checks = Vec::new();
        let req = Request::new("alice", "alice").with_admin("alice");

        assert_eq!(evaluate(&checks, &req, None).unwrap(), Decision::Deny);
        assert_eq!(evaluate_verdict(&checks, &req, None).unwrap().evaluated, 0);
    }

    #[test]
    fn test_short_circuit_skips_exploding_check() {
        let false_calls = Arc::new(AtomicUsize::new(0));
        let true_calls = Arc::new(AtomicUsize::new(0));
        let boom_calls = Arc::new(AtomicUsize::new(0));
        let checks: Checks = vec![
            constant("false_check", false, false_calls.clone()),
            constant("true_check", true, true_calls.clone()),
            exploding(boom_calls.clone()),
        ];

        let decision = evaluate(&checks, &Request::new("bob", "alice"), None).unwrap();

        assert_eq!(decision, Decision::Allow);
        assert_eq!(false_calls.load(Ordering::SeqCst), 1);
        assert_eq!(true_calls.load(Ordering::SeqCst), 1);
        assert_eq!(boom_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_error_propagates_and_stops_evaluation() {
        let false_calls = Arc::new(AtomicUsize::new(0));
        let true_calls = Arc::new(AtomicUsize::new(0));
        let boom_calls = Arc::new(AtomicUsize::new(0));
        let checks: Checks = vec![
            constant("false_check", false, false_calls.clone()),
            exploding(boom_calls.clone()),
            constant("true_check", true, true_calls.clone()),
        ];

        let err = evaluate(&checks, &Request::new("bob", "alice"), None).unwrap_err();

        match err {
            CheckError::Failed { check, message } => {
                assert_eq!(check, "exploding");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(false_calls.load(Ordering::SeqCst), 1);
        assert_eq!(boom_calls.load(Ordering::SeqCst), 1);
        assert_eq!(true_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_target_is_forwarded() {
        let owns: Vec<Arc<dyn Check<Request, str>>> = vec![Arc::new(predicate(
            "owns_document",
            |req: &Request, owner: Option<&str>| owner == Some(req.user),
        ))];
        let req = Request::new("alice", "nobody");

        assert!(evaluate(&owns, &req, Some("alice")).unwrap().is_allowed());
        assert!(evaluate(&owns, &req, Some("bob")).unwrap().is_denied());
        assert!(evaluate(&owns, &req, None).unwrap().is_denied());
    }

    fn answers(bools: &[bool]) -> Checks {
        bools
            .iter()
            .map(|&answer| {
                let name = if answer { "yes" } else { "no" };
                Arc::new(predicate(name, move |_: &Request, _: Option<&()>| answer))
                    as Arc<dyn Check<Request>>
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_decision_is_logical_or(bools in prop::collection::vec(any::<bool>(), 0..16)) {
            let checks = answers(&bools);
            let decision = evaluate(&checks, &Request::new("x", "y"), None).unwrap();
            prop_assert_eq!(decision.is_allowed(), bools.iter().any(|b| *b));
        }

        #[test]
        fn prop_stops_at_first_true(bools in prop::collection::vec(any::<bool>(), 0..16)) {
            let calls = Arc::new(AtomicUsize::new(0));
            let checks: Checks = bools
                .iter()
                .map(|&answer| constant("counted", answer, calls.clone()))
                .collect();

            let verdict = evaluate_verdict(&checks, &Request::new("x", "y"), None).unwrap();
            let expected = bools
                .iter()
                .position(|b| *b)
                .map(|i| i + 1)
                .unwrap_or(bools.len());

            prop_assert_eq!(calls.load(Ordering::SeqCst), expected);
            prop_assert_eq!(verdict.evaluated, expected);
        }

        #[test]
        fn prop_order_does_not_change_decision(
            pair in prop::collection::vec(any::<bool>(), 0..16)
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            let (bools, shuffled) = pair;
            let req = Request::new("x", "y");
            let original = evaluate(&answers(&bools), &req, None).unwrap();
            let permuted = evaluate(&answers(&shuffled), &req, None).unwrap();
            prop_assert_eq!(original, permuted);
        }
    }
}
