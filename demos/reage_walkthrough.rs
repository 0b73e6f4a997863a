//! Re-age walkthrough.
//!
//! Re-ages a loan with a down payment, undoes it, re-ages again after a
//! repayment and disburses a second tranche into the re-aged plan.

use chrono::NaiveDate;
use loan_replay::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn main() {
    println!("╔══════════════════════════════════════╗");
    println!("║  loan-replay: Re-age Walkthrough     ║");
    println!("╚══════════════════════════════════════╝\n");

    let clock = Arc::new(ManualClock::new(date(2023, 1, 1)));
    let book = LoanBook::new(clock.clone());
    let loan = book
        .create_loan(LoanTerms {
            currency: CurrencyCode::default(),
            principal: dec!(1250),
            down_payment: Some(DownPaymentTerms {
                percentage: dec!(25),
                auto_repayment: true,
            }),
            repayment_frequency: Frequency::monthly(),
            number_of_installments: 3,
            interest_rate_per_period: dec!(0),
        })
        .unwrap();
    book.disburse(loan, dec!(1250), date(2023, 1, 1)).unwrap();

    // --- Step 1: late fee and re-age ---
    println!("━━━ Step 1: Fee on 11 April, re-age on 12 April ━━━\n");
    clock.set(date(2023, 4, 11));
    book.add_charge(loan, ChargeKind::Fee, dec!(10), date(2023, 4, 11))
        .unwrap();

    clock.set(date(2023, 4, 12));
    println!("{}", book.re_age_template(loan).unwrap());
    let request = ReAgeRequest::new(Frequency::monthly(), 4, date(2023, 4, 12));
    let preview = book.preview_re_age(loan, &request).unwrap();
    println!("Preview: re-age {} until {:?}\n", preview.amount, preview.maturity_date);
    book.re_age(loan, &request).unwrap();
    println!("{}", book.snapshot(loan).unwrap());

    // --- Step 2: undo ---
    println!("━━━ Step 2: Undo on 13 April ━━━\n");
    clock.set(date(2023, 4, 13));
    book.undo_re_age(loan).unwrap();
    println!("{}", book.snapshot(loan).unwrap());

    // --- Step 3: repay and re-age every 30 days ---
    println!("━━━ Step 3: Repay 100, re-age every 30 days ━━━\n");
    book.repay(loan, dec!(100), date(2023, 4, 13), Some("walkthrough-1".into()))
        .unwrap();
    book.re_age(
        loan,
        &ReAgeRequest::new(Frequency::new(FrequencyUnit::Days, 30), 3, date(2023, 4, 13)),
    )
    .unwrap();
    println!("{}", book.snapshot(loan).unwrap());

    // --- Step 4: second tranche ---
    println!("━━━ Step 4: Disburse 100 more on 14 April ━━━\n");
    clock.set(date(2023, 4, 14));
    book.disburse(loan, dec!(100), date(2023, 4, 14)).unwrap();
    println!("{}", book.snapshot(loan).unwrap());

    println!("━━━ Events ━━━\n");
    for event in book.drain_events() {
        println!("  {:?}", event);
    }
}
