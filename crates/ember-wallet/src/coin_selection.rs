//! Size-aware greedy coin selection.
//!
//! UTXOs are split into spendable-now (non-stake, or stake at maturity) and
//! immature stake outputs. Mature outputs are consumed smallest first to
//! consolidate dust; immature ones follow, closest to maturity first. The
//! fee is recomputed from the estimated serialized size every time an input
//! is added, so the stopping point accounts for the bytes each input costs.
//!
//! This is a deterministic heuristic, not a fee optimum: the same UTXO set
//! and request always produce the same selection.

use std::cmp::Ordering;

use bitcoin::VarInt;
use ember_core::address::Address;
use ember_core::amount::checked_sum;
use ember_core::constants::{P2PKH_SCRIPT_LEN, TX_FIXED_SIZE, TX_INPUT_SIZE};
use ember_core::script::Script;
use ember_core::types::{output_size, UnspentOutput};
use tracing::debug;

use crate::error::WalletError;

/// Where a requested value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Pay-to-pubkey-hash output to an address.
    Address(Address),
    /// Output locked by an explicit script (contract create/call).
    Script(Script),
    /// Gas reserved for contract execution. Counts toward the required
    /// value but is not serialized; miners collect it through the fee.
    GasBudget,
}

/// A value the transaction must fund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRequest {
    /// Value in satoshis.
    pub value: u64,
    pub destination: Destination,
}

impl OutputRequest {
    pub fn to_address(address: Address, value: u64) -> Self {
        Self {
            value,
            destination: Destination::Address(address),
        }
    }

    pub fn to_script(script: Script, value: u64) -> Self {
        Self {
            value,
            destination: Destination::Script(script),
        }
    }

    pub fn gas_budget(value: u64) -> Self {
        Self {
            value,
            destination: Destination::GasBudget,
        }
    }

    /// Locking script of the serialized output, or `None` for a gas budget.
    pub fn script_pubkey(&self) -> Option<Script> {
        match &self.destination {
            Destination::Address(addr) => Some(addr.script_pubkey()),
            Destination::Script(script) => Some(script.clone()),
            Destination::GasBudget => None,
        }
    }

    /// Bytes this request adds to the serialized transaction.
    pub fn serialized_size(&self) -> usize {
        match &self.destination {
            Destination::Address(_) => output_size(P2PKH_SCRIPT_LEN),
            Destination::Script(script) => output_size(script.len()),
            Destination::GasBudget => 0,
        }
    }

    fn is_serialized(&self) -> bool {
        !matches!(self.destination, Destination::GasBudget)
    }
}

/// Estimated size of a signed transaction spending `n_inputs`
/// pay-to-pubkey-hash inputs into `outputs` (plus a change output when
/// `with_change`).
pub fn estimate_size(n_inputs: usize, outputs: &[OutputRequest], with_change: bool) -> usize {
    let mut n_outputs = outputs.iter().filter(|o| o.is_serialized()).count();
    let mut output_bytes: usize = outputs.iter().map(OutputRequest::serialized_size).sum();
    if with_change {
        n_outputs += 1;
        output_bytes += output_size(P2PKH_SCRIPT_LEN);
    }
    TX_FIXED_SIZE
        + VarInt(n_inputs as u64).size()
        + n_inputs * TX_INPUT_SIZE
        + VarInt(n_outputs as u64).size()
        + output_bytes
}

fn fee_for_size(fee_rate: u64, size: usize) -> Result<u64, WalletError> {
    fee_rate
        .checked_mul(size as u64)
        .ok_or_else(|| WalletError::InvalidAmount("fee overflow".into()))
}

/// Result of coin selection: which UTXOs to spend and the fee/change breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected UTXOs, in the order they become inputs.
    pub selected: Vec<UnspentOutput>,
    /// Total value of selected UTXOs.
    pub total_value: u64,
    /// Sum of every requested output, gas budget included.
    pub required: u64,
    /// Estimated network fee, excluding gas.
    pub fee: u64,
    /// Value returned to the sender. Zero means no change output.
    pub change: u64,
}

/// Order UTXOs the way selection consumes them.
///
/// Mature outputs ascending by value, then immature stake outputs
/// descending by confirmations. Remaining ties fall back to the outpoint
/// so the order is total.
pub fn selection_order(utxos: &[UnspentOutput]) -> Vec<&UnspentOutput> {
    let by_outpoint = |a: &UnspentOutput, b: &UnspentOutput| -> Ordering {
        a.outpoint
            .txid
            .cmp(&b.outpoint.txid)
            .then(a.outpoint.vout.cmp(&b.outpoint.vout))
    };

    let (mut mature, mut immature): (Vec<&UnspentOutput>, Vec<&UnspentOutput>) =
        utxos.iter().partition(|u| u.is_mature());

    mature.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| by_outpoint(a, b)));
    immature.sort_by(|a, b| {
        b.confirmations
            .cmp(&a.confirmations)
            .then(a.value.cmp(&b.value))
            .then_with(|| by_outpoint(a, b))
    });

    mature.extend(immature);
    mature
}

/// Greedy coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Select UTXOs that fund `outputs` plus the size-dependent fee.
    ///
    /// # Arguments
    /// - `utxos` — spendable outputs of the wallet address
    /// - `outputs` — requested outputs, gas budget included
    /// - `fee_rate` — satoshis per byte, at least 1
    pub fn select(
        utxos: &[UnspentOutput],
        outputs: &[OutputRequest],
        fee_rate: u64,
    ) -> Result<CoinSelection, WalletError> {
        if outputs.is_empty() {
            return Err(WalletError::BuildError("no outputs requested".into()));
        }
        if fee_rate == 0 {
            return Err(WalletError::InvalidAmount("fee rate must be non-zero".into()));
        }

        let required = checked_sum(outputs.iter().map(|o| o.value))?;
        if required == 0 {
            return Err(WalletError::InvalidAmount("nothing to spend".into()));
        }

        let mut selected = Vec::new();
        let mut total_value: u64 = 0;
        let mut need = required;

        for utxo in selection_order(utxos) {
            selected.push(utxo.clone());
            total_value = total_value
                .checked_add(utxo.value)
                .ok_or_else(|| WalletError::InvalidAmount("input value overflow".into()))?;

            let fee = fee_for_size(fee_rate, estimate_size(selected.len(), outputs, false))?;
            need = required
                .checked_add(fee)
                .ok_or_else(|| WalletError::InvalidAmount("required value overflow".into()))?;
            if total_value < need {
                continue;
            }

            // Only pay for a change output when the surplus can fund it;
            // otherwise the surplus is left to the miner.
            let fee_with_change =
                fee_for_size(fee_rate, estimate_size(selected.len(), outputs, true))?;
            let surplus = total_value - required;
            let (fee, change) = if surplus > fee_with_change {
                (fee_with_change, surplus - fee_with_change)
            } else {
                (surplus, 0)
            };

            debug!(
                inputs = selected.len(),
                total_value, required, fee, change, "coin selection complete"
            );
            return Ok(CoinSelection {
                selected,
                total_value,
                required,
                fee,
                change,
            });
        }

        Err(WalletError::InsufficientFunds {
            have: total_value,
            need,
        })
    }

    /// Largest value a single `template` output could carry (on top of
    /// `fixed` requests such as a gas budget) that [`select`](Self::select)
    /// can still fund. Returns 0 when nothing is spendable.
    pub fn max_spendable(
        utxos: &[UnspentOutput],
        template: &OutputRequest,
        fixed: &[OutputRequest],
        fee_rate: u64,
    ) -> Result<u64, WalletError> {
        if fee_rate == 0 {
            return Err(WalletError::InvalidAmount("fee rate must be non-zero".into()));
        }
        let fixed_value = checked_sum(fixed.iter().map(|o| o.value))?;
        let mut outputs = Vec::with_capacity(fixed.len() + 1);
        outputs.push(template.clone());
        outputs.extend_from_slice(fixed);

        let mut total: u64 = 0;
        let mut best: u64 = 0;
        for (i, utxo) in selection_order(utxos).into_iter().enumerate() {
            total = total
                .checked_add(utxo.value)
                .ok_or_else(|| WalletError::InvalidAmount("input value overflow".into()))?;
            let fee = fee_for_size(fee_rate, estimate_size(i + 1, &outputs, false))?;
            let spendable = total
                .saturating_sub(fee)
                .saturating_sub(fixed_value);
            best = best.max(spendable);
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::address::Network;
    use ember_core::constants::STAKE_MATURITY;
    use ember_core::script::pay_to_pubkey_hash;
    use ember_core::types::{OutPoint, Txid};

    fn make_utxo(index: u8, value: u64, confirmations: u64, is_stake: bool) -> UnspentOutput {
        UnspentOutput {
            outpoint: OutPoint {
                txid: Txid([index; 32]),
                vout: 0,
            },
            address: String::new(),
            value,
            confirmations,
            is_stake,
            script_pubkey: pay_to_pubkey_hash(&[0x01; 20]),
        }
    }

    fn recipient(value: u64) -> OutputRequest {
        OutputRequest::to_address(Address::from_pubkey_hash([0xaa; 20], Network::Testnet), value)
    }

    fn values(sel: &CoinSelection) -> Vec<u64> {
        sel.selected.iter().map(|u| u.value).collect()
    }

    #[test]
    fn size_estimate_single_p2pkh() {
        // 10 overhead + 148 input + 34 output
        assert_eq!(estimate_size(1, &[recipient(1)], false), 192);
        assert_eq!(estimate_size(1, &[recipient(1)], true), 226);
        assert_eq!(estimate_size(2, &[recipient(1)], false), 340);
    }

    #[test]
    fn gas_budget_adds_no_bytes() {
        let with_gas = [recipient(1), OutputRequest::gas_budget(1_000)];
        assert_eq!(estimate_size(1, &with_gas, false), estimate_size(1, &[recipient(1)], false));
    }

    #[test]
    fn smallest_mature_first() {
        let utxos = vec![
            make_utxo(1, 5_000, 10, false),
            make_utxo(2, 3_000, 10, false),
            make_utxo(3, 2_000, 10, false),
        ];
        let sel = CoinSelector::select(&utxos, &[recipient(4_000)], 1).unwrap();
        // 2 inputs: need 4000 + 340; with change 4000 + 374 < 5000
        assert_eq!(values(&sel), vec![2_000, 3_000]);
        assert_eq!(sel.fee, 374);
        assert_eq!(sel.change, 626);
    }

    #[test]
    fn fee_grows_with_inputs() {
        let utxos = vec![
            make_utxo(1, 5_000, 10, false),
            make_utxo(2, 3_000, 10, false),
            make_utxo(3, 2_000, 10, false),
        ];
        // rate 10: two inputs need 4000 + 3400 > 5000, so all three
        let sel = CoinSelector::select(&utxos, &[recipient(4_000)], 10).unwrap();
        assert_eq!(values(&sel), vec![2_000, 3_000, 5_000]);
        assert_eq!(sel.total_value, 10_000);
        assert_eq!(sel.fee + sel.change + sel.required, sel.total_value);
    }

    #[test]
    fn exact_match_has_zero_change() {
        let fee = estimate_size(1, &[recipient(1)], false) as u64;
        let utxos = vec![make_utxo(1, 10_000 + fee, 1, false)];
        let sel = CoinSelector::select(&utxos, &[recipient(10_000)], 1).unwrap();
        assert_eq!(sel.change, 0);
        assert_eq!(sel.fee, fee);
    }

    #[test]
    fn one_short_of_exact_fails() {
        let fee = estimate_size(1, &[recipient(1)], false) as u64;
        let utxos = vec![make_utxo(1, 10_000 + fee - 1, 1, false)];
        let err = CoinSelector::select(&utxos, &[recipient(10_000)], 1).unwrap_err();
        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                have: 10_000 + fee - 1,
                need: 10_000 + fee,
            }
        );
    }

    #[test]
    fn surplus_too_small_for_change_goes_to_fee() {
        let base = estimate_size(1, &[recipient(1)], false) as u64;
        // surplus of base + 10 cannot fund the 34-byte change output
        let utxos = vec![make_utxo(1, 10_000 + base + 10, 1, false)];
        let sel = CoinSelector::select(&utxos, &[recipient(10_000)], 1).unwrap();
        assert_eq!(sel.change, 0);
        assert_eq!(sel.fee, base + 10);
    }

    #[test]
    fn immature_stake_used_last_soonest_first() {
        let utxos = vec![
            make_utxo(1, 1_000, 100, true),
            make_utxo(2, 1_000, 400, true),
            make_utxo(3, 1_000, STAKE_MATURITY, true),
            make_utxo(4, 1_000, 0, false),
        ];
        let order: Vec<u8> = selection_order(&utxos)
            .iter()
            .map(|u| u.outpoint.txid.0[0])
            .collect();
        // mature (3, 4) by value then outpoint, then immature by confirmations desc
        assert_eq!(order, vec![3, 4, 2, 1]);
    }

    #[test]
    fn mature_stake_counts_as_mature() {
        let utxos = vec![
            make_utxo(1, 50_000, STAKE_MATURITY, true),
            make_utxo(2, 10_000, STAKE_MATURITY - 1, true),
        ];
        let sel = CoinSelector::select(&utxos, &[recipient(20_000)], 1).unwrap();
        assert_eq!(sel.selected.len(), 1);
        assert_eq!(sel.selected[0].value, 50_000);
    }

    #[test]
    fn gas_budget_counts_toward_required() {
        let utxos = vec![make_utxo(1, 10_000, 1, false), make_utxo(2, 20_000, 1, false)];
        let outputs = [
            OutputRequest::to_script(Script::from_bytes(vec![0x54; 30]), 0),
            OutputRequest::gas_budget(15_000),
        ];
        let sel = CoinSelector::select(&utxos, &outputs, 1).unwrap();
        assert_eq!(sel.required, 15_000);
        assert_eq!(sel.selected.len(), 2);
        assert!(sel.total_value >= sel.required + sel.fee);
    }

    #[test]
    fn empty_utxos_insufficient() {
        let err = CoinSelector::select(&[], &[recipient(1)], 1).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 0, need: 1 });
    }

    #[test]
    fn zero_request_rejected() {
        let utxos = vec![make_utxo(1, 1_000, 1, false)];
        let err = CoinSelector::select(&utxos, &[recipient(0)], 1).unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[test]
    fn zero_fee_rate_rejected() {
        let utxos = vec![make_utxo(1, 1_000, 1, false)];
        assert!(matches!(
            CoinSelector::select(&utxos, &[recipient(10)], 0).unwrap_err(),
            WalletError::InvalidAmount(_)
        ));
    }

    #[test]
    fn no_outputs_rejected() {
        let utxos = vec![make_utxo(1, 1_000, 1, false)];
        assert!(matches!(
            CoinSelector::select(&utxos, &[], 1).unwrap_err(),
            WalletError::BuildError(_)
        ));
    }

    #[test]
    fn deterministic_for_shuffled_input() {
        let a = vec![
            make_utxo(1, 700, 1, false),
            make_utxo(2, 700, 1, false),
            make_utxo(3, 300, 1, false),
        ];
        let mut b = a.clone();
        b.reverse();
        let sa = CoinSelector::select(&a, &[recipient(600)], 1).unwrap();
        let sb = CoinSelector::select(&b, &[recipient(600)], 1).unwrap();
        assert_eq!(sa, sb);
    }

    #[test]
    fn max_spendable_is_exactly_fundable() {
        let utxos = vec![
            make_utxo(1, 5_000, 1, false),
            make_utxo(2, 3_000, 1, false),
            make_utxo(3, 2_000, 1, false),
        ];
        let template = recipient(0);
        let max = CoinSelector::max_spendable(&utxos, &template, &[], 2).unwrap();
        assert_eq!(max, 10_000 - 2 * estimate_size(3, &[recipient(1)], false) as u64);
        assert!(CoinSelector::select(&utxos, &[recipient(max)], 2).is_ok());
        assert!(CoinSelector::select(&utxos, &[recipient(max + 1)], 2).is_err());
    }

    #[test]
    fn max_spendable_includes_leading_dust() {
        // selection is a prefix, so the 10-sat output is spent although its input costs more
        let utxos = vec![make_utxo(1, 10, 1, false), make_utxo(2, 100_000, 1, false)];
        let template = recipient(0);
        let max = CoinSelector::max_spendable(&utxos, &template, &[], 1).unwrap();
        assert_eq!(max, 100_010 - 340);
        assert!(CoinSelector::select(&utxos, &[recipient(max)], 1).is_ok());
        assert!(CoinSelector::select(&utxos, &[recipient(max + 1)], 1).is_err());
    }

    #[test]
    fn max_spendable_zero_when_fee_exceeds_balance() {
        let utxos = vec![make_utxo(1, 100, 1, false)];
        let max = CoinSelector::max_spendable(&utxos, &recipient(0), &[], 10).unwrap();
        assert_eq!(max, 0);
    }
}
