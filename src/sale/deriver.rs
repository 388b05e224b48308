//! Derivation of the user-facing sale view from a decoded configuration.
//!
//! `SaleStateDeriver::derive` is pure: the same configuration, clock and whitelist balance
//! always produce the same `SaleView`.

use super::types::*;

/// Display units for prices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUnits {
	pub native_symbol: String,
	pub native_decimals: u32,
	/// Symbol shown when the sale is paid in a token
	pub token_symbol: String,
	pub token_decimals: u32,
}

impl Default for PaymentUnits {
	fn default() -> Self {
		Self {
			native_symbol: "SOL".to_string(),
			native_decimals: 9,
			token_symbol: "TOKEN".to_string(),
			token_decimals: 9,
		}
	}
}

/// Maps a `SaleConfig` to a `SaleView`
#[derive(Debug, Clone, Default)]
pub struct SaleStateDeriver {
	units: PaymentUnits,
}

impl SaleStateDeriver {
	pub fn new(units: PaymentUnits) -> Self {
		Self { units }
	}

	pub fn units(&self) -> &PaymentUnits {
		&self.units
	}

	/// Derive the sale view.
	///
	/// # Arguments
	/// * `config` - The sale configuration snapshot.
	/// * `now` - Current unix time in seconds.
	/// * `whitelist_balance` - Whitelist tokens held by the wallet, if known.
	pub fn derive(&self, config: &SaleConfig, now: i64, whitelist_balance: Option<u64>) -> SaleView {
		let balance = whitelist_balance.unwrap_or(0);

		let items_cap = config.effective_cap();
		let items_remaining = items_cap.saturating_sub(config.items_redeemed);

		let is_ended = matches!(config.end_setting, Some(EndSetting::Date(end)) if now >= end);
		let is_sold_out = items_remaining == 0;

		let go_live_passed = config.go_live_date.is_some_and(|go_live| now >= go_live);
		// presale is the window before go-live in which holders may mint
		let is_presale = config.whitelist.as_ref().is_some_and(|wl| wl.presale) && !go_live_passed;

		let price = match &config.whitelist {
			Some(wl) if balance > 0 && (is_presale || !is_ended) => {
				wl.discount_price.unwrap_or(config.price)
			}
			_ => config.price,
		};

		let is_whitelist_only = config
			.whitelist
			.as_ref()
			.is_some_and(|wl| wl.discount_price.is_none() && !wl.presale);

		let is_active = if is_sold_out || is_ended {
			false
		} else if is_presale {
			balance > 0
		} else {
			go_live_passed && (!is_whitelist_only || balance > 0)
		};

		let (price_label, decimals) = match config.token_mint {
			Some(_) => (self.units.token_symbol.clone(), self.units.token_decimals),
			None => (self.units.native_symbol.clone(), self.units.native_decimals),
		};

		SaleView {
			is_active,
			is_ended,
			is_sold_out,
			is_presale,
			is_whitelist_only,
			price,
			price_ui: price as f64 / 10f64.powi(decimals as i32),
			price_label,
			items_cap,
			items_redeemed: config.items_redeemed,
			items_remaining,
			whitelist_token_balance: balance,
		}
	}
}
