//! Adversarial property-based test suite for Ember coin selection and
//! transaction assembly.
//!
//! Each property test uses 256 cases with proptest shrinking to produce
//! minimal failing examples.
//!
//! Invariants tested:
//! - Selected inputs always cover requested outputs plus fee
//! - Selection is deterministic regardless of UTXO arrival order
//! - A larger request never selects fewer inputs
//! - Sub-satoshi decimal amounts are rejected
//! - Assembled transactions decode to themselves and every input verifies
//! - Gas values in contract scripts decode back to the requested numbers

use proptest::prelude::*;

use ember_core::address::{Address, Network};
use ember_core::amount::to_smallest_unit;
use ember_core::constants::STAKE_MATURITY;
use ember_core::crypto::verify_transaction_input;
use ember_core::error::AmountError;
use ember_core::script::contract_call;
use ember_core::types::{Transaction, UnspentOutput};
use ember_tests::helpers::{address, foreign_address, keypair, utxo};
use ember_wallet::coin_selection::{estimate_size, selection_order};
use ember_wallet::{CoinSelector, OutputRequest, TransactionBuilder, WalletError};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// (value, confirmations, is_stake) triples.
fn utxo_specs() -> impl Strategy<Value = Vec<(u64, u64, bool)>> {
    prop::collection::vec(
        (1u64..=50_000_000, 0u64..=2 * STAKE_MATURITY, any::<bool>()),
        1..=12,
    )
}

fn build_utxos(owner: &Address, specs: &[(u64, u64, bool)]) -> Vec<UnspentOutput> {
    specs
        .iter()
        .enumerate()
        .map(|(i, (value, confs, stake))| utxo(owner, i as u32, *value, *confs, *stake))
        .collect()
}

fn recipient(value: u64) -> OutputRequest {
    OutputRequest::to_address(foreign_address(0x77), value)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn selection_covers_outputs_and_fee(
        specs in utxo_specs(),
        amount in 1u64..=200_000_000,
        gas in 0u64..=10_000_000,
        fee_rate in 1u64..=1_000,
    ) {
        let utxos = build_utxos(&address(1), &specs);
        let mut outputs = vec![recipient(amount)];
        if gas > 0 {
            outputs.push(OutputRequest::gas_budget(gas));
        }

        match CoinSelector::select(&utxos, &outputs, fee_rate) {
            Ok(sel) => {
                prop_assert!(sel.total_value >= sel.required + sel.fee);
                prop_assert_eq!(sel.required, amount + gas);
                prop_assert_eq!(sel.total_value - sel.required - sel.fee, sel.change);

                let n = sel.selected.len();
                let min_fee = fee_rate * estimate_size(n, &outputs, sel.change > 0) as u64;
                prop_assert!(sel.fee >= min_fee);

                // the selection is a prefix of the policy order
                let order = selection_order(&utxos);
                for (chosen, expected) in sel.selected.iter().zip(order.iter()) {
                    prop_assert_eq!(&chosen.outpoint, &expected.outpoint);
                }
            }
            Err(WalletError::InsufficientFunds { have, need }) => {
                let total: u64 = utxos.iter().map(|u| u.value).sum();
                prop_assert_eq!(have, total);
                prop_assert!(have < need);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn selection_ignores_arrival_order(
        specs in utxo_specs(),
        amount in 1u64..=100_000_000,
        fee_rate in 1u64..=500,
        rotate in 0usize..12,
    ) {
        let utxos = build_utxos(&address(1), &specs);
        let mut shuffled = utxos.clone();
        let len = shuffled.len();
        shuffled.rotate_left(rotate % len);
        shuffled.reverse();

        let a = CoinSelector::select(&utxos, &[recipient(amount)], fee_rate);
        let b = CoinSelector::select(&shuffled, &[recipient(amount)], fee_rate);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn larger_request_never_selects_fewer_inputs(
        specs in utxo_specs(),
        small in 1u64..=50_000_000,
        extra in 0u64..=50_000_000,
        fee_rate in 1u64..=500,
    ) {
        let utxos = build_utxos(&address(1), &specs);
        let a = CoinSelector::select(&utxos, &[recipient(small)], fee_rate);
        let b = CoinSelector::select(&utxos, &[recipient(small + extra)], fee_rate);
        if let (Ok(a), Ok(b)) = (&a, &b) {
            prop_assert!(b.selected.len() >= a.selected.len());
        }
        if a.is_err() {
            prop_assert!(b.is_err());
        }
    }

    #[test]
    fn max_spendable_is_the_funding_boundary(
        specs in utxo_specs(),
        fee_rate in 1u64..=500,
    ) {
        let utxos = build_utxos(&address(1), &specs);
        let max = CoinSelector::max_spendable(&utxos, &recipient(0), &[], fee_rate).unwrap();
        if max > 0 {
            prop_assert!(CoinSelector::select(&utxos, &[recipient(max)], fee_rate).is_ok());
        }
        let over = CoinSelector::select(&utxos, &[recipient(max + 1)], fee_rate);
        let is_insufficient = matches!(over, Err(WalletError::InsufficientFunds { .. }));
        prop_assert!(is_insufficient);
    }
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn sub_satoshi_amounts_rejected(
        whole in 0u64..=21_000_000,
        frac in 0u64..100_000_000,
        ninth in 1u8..=9,
    ) {
        let s = format!("{whole}.{frac:08}{ninth}");
        prop_assert_eq!(to_smallest_unit(&s), Err(AmountError::Fractional(s.clone())));
    }

    #[test]
    fn eight_decimals_are_exact(
        whole in 0u64..=21_000_000,
        frac in 0u64..100_000_000,
    ) {
        let s = format!("{whole}.{frac:08}");
        prop_assert_eq!(to_smallest_unit(&s).unwrap(), whole * 100_000_000 + frac);
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn assembled_transaction_decodes_and_verifies(
        values in prop::collection::vec(10_000u64..=5_000_000, 1..=6),
        amount in 1_000u64..=2_000_000,
        fee_rate in 1u64..=20,
    ) {
        let kp = keypair(3);
        let owner = Address::from_keypair(&kp, Network::Testnet);
        let utxos: Vec<UnspentOutput> = values
            .iter()
            .enumerate()
            .map(|(i, v)| utxo(&owner, i as u32, *v, 1, false))
            .collect();

        let mut builder = TransactionBuilder::new(fee_rate);
        builder.add_recipient(foreign_address(0x42), amount);
        let unsigned = match builder.build(&utxos, &owner) {
            Ok(unsigned) => unsigned,
            Err(WalletError::InsufficientFunds { .. }) => return Ok(()),
            Err(other) => return Err(TestCaseError::fail(other.to_string())),
        };
        let signed = TransactionBuilder::sign(unsigned, &kp).unwrap();

        let decoded = Transaction::from_hex(&signed.to_hex()).unwrap();
        prop_assert_eq!(&decoded, &signed.tx);
        prop_assert_eq!(decoded.txid(), signed.txid());

        let script_code = owner.script_pubkey();
        for i in 0..decoded.inputs.len() {
            prop_assert!(verify_transaction_input(&decoded, i, &script_code).is_ok());
        }

        let spent: u64 = decoded
            .inputs
            .iter()
            .map(|input| {
                utxos
                    .iter()
                    .find(|u| u.outpoint == input.previous_output)
                    .map(|u| u.value)
                    .unwrap_or(0)
            })
            .sum();
        prop_assert_eq!(spent, decoded.total_output_value().unwrap() + signed.fee);
        prop_assert_eq!(decoded.outputs.len(), if signed.change > 0 { 2 } else { 1 });
    }

    #[test]
    fn contract_gas_values_decode_back(
        gas_limit in 1u64..=i32::MAX as u64,
        gas_price in 1u64..=1_000_000,
    ) {
        let script = contract_call(gas_limit, gas_price, &[0xde, 0xad], &[7u8; 20]).unwrap();
        let ins = script.instructions().unwrap();
        prop_assert_eq!(ins.len(), 6);

        prop_assert_eq!(ins[0].script_num(), Some(4));
        prop_assert_eq!(ins[1].script_num(), Some(gas_limit as i64));
        prop_assert_eq!(ins[2].script_num(), Some(gas_price as i64));
    }
}
