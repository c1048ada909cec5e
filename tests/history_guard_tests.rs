//! History navigation can never land on the form without a completed method

mod fixtures;

use fixtures::{session, verify_phone, FakeRegistration, TRUST_EXPIRY};
use proptest::prelude::*;
use signup_wizard::signup::{FieldEdit, Method, Sex, UserAction, WizardSession, WizardStep};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_forward_to_form_after_expiry_redirects_to_method() {
    let mut session = session(FakeRegistration::default());
    verify_phone(&mut session).await;

    session.dispatch(UserAction::Back).unwrap();
    assert!(session.step().await);
    session.dispatch(UserAction::Back).unwrap();
    tokio::time::advance(TRUST_EXPIRY).await;
    assert!(session.step().await);
    assert!(!session.controller().method_completed());

    assert!(session.host().can_go_forward());
    session.host_mut().forward();
    assert!(session.step().await);

    let wizard = session.controller();
    assert_eq!(wizard.step(), WizardStep::Method);
    assert_eq!(
        wizard.history().entries(),
        &[WizardStep::Welcome, WizardStep::Method]
    );
    assert_eq!(session.host().current(), WizardStep::Method);
}

#[tokio::test(start_paused = true)]
async fn test_back_after_redirect_skips_the_duplicate_method_entry() {
    let mut session = session(FakeRegistration::default());
    verify_phone(&mut session).await;
    session.dispatch(UserAction::Back).unwrap();
    assert!(session.step().await);
    session.dispatch(UserAction::Back).unwrap();
    tokio::time::advance(TRUST_EXPIRY).await;
    assert!(session.step().await);
    session.host_mut().forward();
    assert!(session.step().await);
    assert_eq!(
        session.host().entries(),
        vec![WizardStep::Welcome, WizardStep::Method, WizardStep::Method]
    );

    // One back press from the selector reaches the welcome step
    session.dispatch(UserAction::Back).unwrap();
    assert!(session.step().await);
    assert_eq!(session.controller().step(), WizardStep::Method);
    assert!(session.step().await);

    let wizard = session.controller();
    assert_eq!(wizard.step(), WizardStep::Welcome);
    assert_eq!(session.host().current(), WizardStep::Welcome);
    assert!(!wizard.can_go_back());
}

#[tokio::test]
async fn test_back_from_thank_you_does_not_reopen_form() {
    let mut session = session(FakeRegistration::default());
    verify_phone(&mut session).await;
    session
        .dispatch(UserAction::EditField(FieldEdit::Age("40".to_string())))
        .unwrap();
    session
        .dispatch(UserAction::EditField(FieldEdit::Sex(Some(Sex::Male))))
        .unwrap();
    session.dispatch(UserAction::Submit).unwrap();
    assert!(session.step().await);
    assert_eq!(session.controller().step(), WizardStep::ThankYou);

    session.dispatch(UserAction::Back).unwrap();
    assert!(session.step().await);

    let wizard = session.controller();
    assert_eq!(wizard.step(), WizardStep::Method);
    assert_eq!(wizard.data().age, "");
}

#[tokio::test]
async fn test_switching_method_clears_the_record_and_the_path_to_form() {
    let mut session = session(FakeRegistration::default());
    verify_phone(&mut session).await;
    session.dispatch(UserAction::Back).unwrap();
    assert!(session.step().await);
    session.dispatch(UserAction::BackToSelector).unwrap();
    assert!(session.controller().is_timer_armed());

    session
        .dispatch(UserAction::SelectMethod(Method::Document))
        .unwrap();
    let wizard = session.controller();
    assert!(!wizard.is_timer_armed());
    assert!(wizard.token().is_none());
    assert!(!wizard.locks().phone);
    assert_eq!(wizard.data().phone, "");
    assert!(!wizard.method_completed());
    assert!(!wizard.selector().phone().is_verified());
    assert_eq!(wizard.selector().phone().phone_draft(), "");

    session.host_mut().forward();
    assert!(session.step().await);
    assert_eq!(session.controller().step(), WizardStep::Method);
}

#[tokio::test]
async fn test_back_at_welcome_is_a_no_op() {
    let mut session = session(FakeRegistration::default());
    session.dispatch(UserAction::Back).unwrap();
    assert_eq!(session.drain(), 0);
    assert_eq!(session.controller().step(), WizardStep::Welcome);
    assert!(!session.controller().can_go_back());
}

#[derive(Debug, Clone)]
enum Op {
    Act(UserAction),
    Forward,
    Wait,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Act(UserAction::Next)),
        Just(Op::Act(UserAction::Back)),
        Just(Op::Act(UserAction::SelectMethod(Method::Phone))),
        Just(Op::Act(UserAction::SelectMethod(Method::Document))),
        Just(Op::Act(UserAction::BackToSelector)),
        Just(Op::Act(UserAction::EditPhone("5512345678".to_string()))),
        Just(Op::Act(UserAction::EditPhone("5500000000".to_string()))),
        Just(Op::Act(UserAction::RequestCode)),
        Just(Op::Act(UserAction::EditCode("1234".to_string()))),
        Just(Op::Act(UserAction::VerifyCode)),
        Just(Op::Act(UserAction::ChangePhone)),
        Just(Op::Act(UserAction::CancelPhone)),
        Just(Op::Act(UserAction::ContinueVerified)),
        Just(Op::Act(UserAction::EditDocumentCode("RAHL031224MCSZRSA8".to_string()))),
        Just(Op::Act(UserAction::EditDocumentCode("NOPE".to_string()))),
        Just(Op::Act(UserAction::LookupDocument)),
        Just(Op::Act(UserAction::Submit)),
        Just(Op::Forward),
        Just(Op::Wait),
    ]
}

async fn settle(session: &mut WizardSession) {
    for _ in 0..4 {
        tokio::task::yield_now().await;
        session.drain();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_form_requires_completed_method(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let mut session = session(FakeRegistration::default());
            for op in ops {
                match op {
                    Op::Act(action) => {
                        let _ = session.dispatch(action);
                    }
                    Op::Forward => session.host_mut().forward(),
                    Op::Wait => tokio::time::advance(TRUST_EXPIRY + Duration::from_secs(1)).await,
                }
                settle(&mut session).await;

                let wizard = session.controller();
                if wizard.step() == WizardStep::Form {
                    assert!(wizard.method_completed(), "form reached without a completed method");
                }
                if wizard.locks().phone {
                    assert!(wizard.method_completed() || wizard.token().is_some());
                }
                let entries = wizard.history().entries();
                assert_eq!(entries[0], WizardStep::Welcome);
                assert!(entries.windows(2).all(|w| w[0] != w[1]));
            }
        });
    }
}
