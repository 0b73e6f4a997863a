//! Reversal cascade example.
//!
//! Shows how a backdated payment and its reversal restate an active
//! re-age, and how undoing the re-age restores the original plan.

use chrono::NaiveDate;
use loan_replay::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn re_age_amount(book: &LoanBook, loan: LoanId) -> Decimal {
    book.transactions(loan)
        .unwrap()
        .iter()
        .rev()
        .find(|t| t.kind == "Re-age")
        .map(|t| t.amount)
        .unwrap_or(Decimal::ZERO)
}

fn main() {
    println!("╔═══════════════════════════════════════════╗");
    println!("║  loan-replay: Reversal Cascade            ║");
    println!("╚═══════════════════════════════════════════╝\n");

    let clock = Arc::new(ManualClock::new(date(2023, 1, 1)));
    let book = LoanBook::new(clock.clone());
    let product = LoanProduct::default().with_overrides(&ProductOverrides {
        name: Some("every-15-days".into()),
        repayment_frequency: Some(Frequency::new(FrequencyUnit::Days, 15)),
        ..Default::default()
    });
    let loan = book.create_loan(product.terms_for(dec!(1250)).unwrap()).unwrap();
    book.disburse(loan, dec!(500), date(2023, 1, 1)).unwrap();

    println!("Disbursed 500 of 1250 on 2023-01-01, installments every 15 days.\n");

    clock.set(date(2023, 2, 27));
    book.re_age(loan, &ReAgeRequest::new(Frequency::monthly(), 6, date(2023, 3, 1)))
        .unwrap();
    println!("Re-age on 2023-02-27:                    {}", re_age_amount(&book, loan));

    book.repay(loan, dec!(125), date(2023, 2, 1), None).unwrap();
    println!("After 125 backdated to 2023-02-01:       {}", re_age_amount(&book, loan));

    clock.set(date(2023, 2, 28));
    let late = book
        .repay(loan, dec!(200), date(2023, 2, 2), Some("late".into()))
        .unwrap();
    println!("After 200 backdated to 2023-02-02:       {}", re_age_amount(&book, loan));

    book.reverse(loan, late, date(2023, 2, 28)).unwrap();
    println!("After reversing the 200:                 {}\n", re_age_amount(&book, loan));
    println!("{}", book.snapshot(loan).unwrap());

    clock.set(date(2023, 3, 1));
    book.undo_re_age(loan).unwrap();
    println!("━━━ After undoing the re-age ━━━\n");
    println!("{}", book.snapshot(loan).unwrap());

    match book.undo_re_age(loan) {
        Ok(_) => println!("Unexpected: second undo succeeded"),
        Err(e) => println!("Second undo rejected [{}]: {}", e.code(), e),
    }
}
